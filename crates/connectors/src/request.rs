use crate::{
    error::ServiceError,
    filter::{expr::FilterExpr, render::render_filter},
};
use model::pagination::window::FetchWindow;

/// One request against an entity set.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    pub table: String,
    pub filter: Option<FilterExpr>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
}

impl EntityQuery {
    /// The same query restricted to one `$skip` / `$top` window.
    pub fn windowed(&self, window: FetchWindow) -> EntityQuery {
        EntityQuery {
            skip: Some(window.offset),
            top: Some(window.limit),
            ..self.clone()
        }
    }

    pub fn rendered_filter(&self) -> Result<Option<String>, ServiceError> {
        match &self.filter {
            Some(expr) => render_filter(expr),
            None => Ok(None),
        }
    }

    /// System query options for a row request.
    pub fn query_pairs(&self) -> Result<Vec<(&'static str, String)>, ServiceError> {
        let mut pairs = vec![("$format", "json".to_string())];
        if let Some(filter) = self.rendered_filter()? {
            pairs.push(("$filter", filter));
        }
        if let Some(skip) = self.skip {
            pairs.push(("$skip", skip.to_string()));
        }
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        Ok(pairs)
    }

    /// System query options for a `/$count` request; paging options do not apply.
    pub fn count_pairs(&self) -> Result<Vec<(&'static str, String)>, ServiceError> {
        Ok(self
            .rendered_filter()?
            .map(|filter| vec![("$filter", filter)])
            .unwrap_or_default())
    }
}

pub struct EntityQueryBuilder {
    table: String,
    filter: Option<FilterExpr>,
    skip: Option<usize>,
    top: Option<usize>,
}

impl EntityQueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        EntityQueryBuilder {
            table: table.into(),
            filter: None,
            skip: None,
            top: None,
        }
    }

    /// ANDs `filter` onto any filter already set.
    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and_also(filter),
            None => filter,
        });
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    pub fn build(self) -> EntityQuery {
        EntityQuery {
            table: self.table,
            filter: self.filter,
            skip: self.skip,
            top: self.top,
        }
    }
}
