use connectors::{
    error::ServiceError,
    filter::expr::{Column, FilterExpr},
    request::{EntityQuery, EntityQueryBuilder},
};
use model::core::value::Value;
use std::{fmt, sync::Arc};

pub type FilterBuilder = Arc<dyn Fn(&QueryContext<'_>) -> FilterExpr + Send + Sync>;

/// What the caller wants to restrict a table to.
#[derive(Clone, Default)]
pub enum Filter {
    #[default]
    None,
    /// A pre-built expression; an empty one is ignored.
    Expr(FilterExpr),
    /// Invoked with the table's context when the query is built.
    Builder(FilterBuilder),
}

impl Filter {
    pub fn builder<F>(build: F) -> Self
    where
        F: Fn(&QueryContext<'_>) -> FilterExpr + Send + Sync + 'static,
    {
        Filter::Builder(Arc::new(build))
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Filter::Expr(FilterExpr::raw(text))
    }

    /// Resolves to a concrete expression, if any applies.
    pub fn resolve(&self, ctx: &QueryContext<'_>) -> Option<FilterExpr> {
        match self {
            Filter::None => None,
            Filter::Expr(expr) if expr.is_empty() => None,
            Filter::Expr(expr) => Some(expr.clone()),
            Filter::Builder(build) => Some(build(ctx)),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::None => f.write_str("None"),
            Filter::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            Filter::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

impl From<FilterExpr> for Filter {
    fn from(expr: FilterExpr) -> Self {
        Filter::Expr(expr)
    }
}

impl From<Option<FilterExpr>> for Filter {
    fn from(expr: Option<FilterExpr>) -> Self {
        expr.map(Filter::Expr).unwrap_or_default()
    }
}

/// Handed to filter builders: the table being queried and its columns.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    table: &'a str,
    columns: &'a [String],
}

impl<'a> QueryContext<'a> {
    pub fn new(table: &'a str, columns: &'a [String]) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> &'a str {
        self.table
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    /// Column reference for building conditions. Names are checked against
    /// the table when the query is built.
    pub fn col(&self, name: &str) -> Column {
        Column::new(name)
    }
}

/// Column equality constraints, ANDed onto the filter in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pairs: Vec<(String, Value)>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.pairs.push((column.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Constraints
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut constraints = Constraints::new();
        for (column, value) in iter {
            constraints.push(column, value);
        }
        constraints
    }
}

/// Builds the unpaged query for `table`.
///
/// The filter (builder output or non-empty expression) comes first; each
/// constraint is then ANDed on as a `column eq value` term. Every column a
/// condition names must belong to the table, and the whole filter must
/// render; raw text and navigation paths are left to the service.
pub fn build_query(
    ctx: &QueryContext<'_>,
    filter: &Filter,
    constraints: &Constraints,
) -> Result<EntityQuery, ServiceError> {
    let mut builder = EntityQueryBuilder::new(ctx.table());
    if let Some(expr) = filter.resolve(ctx) {
        builder = builder.filter(expr);
    }
    for (column, value) in constraints.iter() {
        builder = builder.filter(FilterExpr::eq(column, value.clone()));
    }
    let query = builder.build();

    if let Some(expr) = &query.filter {
        for column in expr.columns() {
            if !column.contains('/') && !ctx.columns().iter().any(|c| c == column) {
                return Err(ServiceError::InvalidQuery(format!(
                    "table '{}' has no column '{column}'",
                    ctx.table()
                )));
            }
        }
    }
    query.rendered_filter()?;
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["ID".into(), "Status".into(), "Language".into()]
    }

    #[test]
    fn no_filter_no_constraints_is_unfiltered() {
        let cols = columns();
        let ctx = QueryContext::new("T", &cols);
        let query = build_query(&ctx, &Filter::None, &Constraints::new()).unwrap();
        assert_eq!(query.table, "T");
        assert_eq!(query.filter, None);
    }

    #[test]
    fn single_constraint_is_the_only_predicate() {
        let cols = columns();
        let ctx = QueryContext::new("T", &cols);
        let query =
            build_query(&ctx, &Filter::None, &Constraints::new().eq("Status", "Active")).unwrap();
        assert_eq!(query.filter, Some(FilterExpr::eq("Status", "Active")));
        assert_eq!(
            query.rendered_filter().unwrap().as_deref(),
            Some("Status eq 'Active'")
        );
    }

    #[test]
    fn builder_receives_context_and_constraints_are_anded() {
        let cols = columns();
        let ctx = QueryContext::new("Vote", &cols);
        let filter = Filter::builder(|ctx| {
            assert_eq!(ctx.table(), "Vote");
            assert_eq!(ctx.columns().len(), 3);
            ctx.col("ID").gt(100)
        });

        let query = build_query(
            &ctx,
            &filter,
            &[("Language", "DE"), ("Status", "Active")].into_iter().collect(),
        )
        .unwrap();
        assert_eq!(
            query.rendered_filter().unwrap().as_deref(),
            Some("(ID gt 100) and (Language eq 'DE') and (Status eq 'Active')")
        );
    }

    #[test]
    fn empty_expression_is_ignored() {
        let cols = columns();
        let ctx = QueryContext::new("T", &cols);
        let query =
            build_query(&ctx, &FilterExpr::and(vec![]).into(), &Constraints::new()).unwrap();
        assert_eq!(query.filter, None);
    }

    #[test]
    fn raw_expression_is_applied_verbatim() {
        let cols = columns();
        let ctx = QueryContext::new("T", &cols);
        let query = build_query(&ctx, &Filter::raw("ID ge 5"), &Constraints::new()).unwrap();
        assert_eq!(query.rendered_filter().unwrap().as_deref(), Some("ID ge 5"));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let cols = columns();
        let ctx = QueryContext::new("Session", &cols);

        let err = build_query(&ctx, &Filter::None, &Constraints::new().eq("NoSuch", 1))
            .unwrap_err();
        assert!(matches!(&err, ServiceError::InvalidQuery(msg) if msg.contains("'NoSuch'")));

        let nested = Filter::builder(|ctx| FilterExpr::not(ctx.col("Missing").contains("x")));
        assert!(build_query(&ctx, &nested, &Constraints::new()).is_err());

        // navigation paths and raw text are not checked
        let path: Filter = FilterExpr::eq("Session/ID", 5).into();
        assert!(build_query(&ctx, &path, &Constraints::new()).is_ok());
        assert!(build_query(&ctx, &Filter::raw("NoSuch gt 1"), &Constraints::new()).is_ok());
    }

    #[test]
    fn unrenderable_values_are_rejected() {
        let cols = columns();
        let ctx = QueryContext::new("T", &cols);
        let err = build_query(&ctx, &Filter::None, &Constraints::new().eq("ID", f64::NAN));
        assert!(matches!(err, Err(ServiceError::InvalidQuery(_))));
    }
}
