use super::condition::{Comparator, Condition, StringMatch};
use model::core::value::Value;

/// A protocol-level filter expression, rendered into `$filter`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Condition(Condition),
    Match {
        column: String,
        kind: StringMatch,
        pattern: String,
    },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    /// Pre-built expression text passed through verbatim.
    Raw(String),
}

impl FilterExpr {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Condition(Condition::eq(column, value))
    }

    pub fn raw(text: impl Into<String>) -> Self {
        FilterExpr::Raw(text.into())
    }

    pub fn and(children: Vec<FilterExpr>) -> Self {
        FilterExpr::And(children)
    }

    pub fn or(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(inner))
    }

    /// True when the expression constrains nothing (blank raw text, empty groups).
    pub fn is_empty(&self) -> bool {
        match self {
            FilterExpr::Raw(text) => text.trim().is_empty(),
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                children.iter().all(FilterExpr::is_empty)
            }
            FilterExpr::Not(inner) => inner.is_empty(),
            FilterExpr::Condition(_) | FilterExpr::Match { .. } => false,
        }
    }

    /// Columns named by conditions and string matches, in order of
    /// appearance. Raw text is opaque and contributes nothing.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterExpr::Condition(cond) => out.push(&cond.column),
            FilterExpr::Match { column, .. } => out.push(column),
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
            FilterExpr::Not(inner) => inner.collect_columns(out),
            FilterExpr::Raw(_) => {}
        }
    }

    /// Conjunction with `other`, flattening nested `And` groups.
    pub fn and_also(self, other: FilterExpr) -> FilterExpr {
        let mut children = match self {
            FilterExpr::And(children) => children,
            expr => vec![expr],
        };
        match other {
            FilterExpr::And(more) => children.extend(more),
            expr => children.push(expr),
        }
        FilterExpr::And(children)
    }
}

/// A column reference used to build conditions fluently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, comparator: Comparator, value: impl Into<Value>) -> FilterExpr {
        FilterExpr::Condition(Condition::new(self.name.clone(), comparator, value))
    }

    pub fn eq(&self, value: impl Into<Value>) -> FilterExpr {
        self.compare(Comparator::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> FilterExpr {
        self.compare(Comparator::Ne, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> FilterExpr {
        self.compare(Comparator::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> FilterExpr {
        self.compare(Comparator::Ge, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> FilterExpr {
        self.compare(Comparator::Lt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> FilterExpr {
        self.compare(Comparator::Le, value)
    }

    fn matching(&self, kind: StringMatch, pattern: impl Into<String>) -> FilterExpr {
        FilterExpr::Match {
            column: self.name.clone(),
            kind,
            pattern: pattern.into(),
        }
    }

    pub fn starts_with(&self, pattern: impl Into<String>) -> FilterExpr {
        self.matching(StringMatch::StartsWith, pattern)
    }

    pub fn ends_with(&self, pattern: impl Into<String>) -> FilterExpr {
        self.matching(StringMatch::EndsWith, pattern)
    }

    pub fn contains(&self, pattern: impl Into<String>) -> FilterExpr {
        self.matching(StringMatch::Contains, pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_also_flattens_groups() {
        let expr = FilterExpr::and(vec![FilterExpr::eq("A", 1), FilterExpr::eq("B", 2)])
            .and_also(FilterExpr::eq("C", 3));

        match expr {
            FilterExpr::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn emptiness() {
        assert!(FilterExpr::raw("   ").is_empty());
        assert!(FilterExpr::and(vec![]).is_empty());
        assert!(FilterExpr::not(FilterExpr::or(vec![FilterExpr::raw("")])).is_empty());
        assert!(!Column::new("Id").gt(3).is_empty());
    }

    #[test]
    fn lists_referenced_columns() {
        let expr = FilterExpr::and(vec![
            Column::new("Language").eq("DE"),
            FilterExpr::raw("Other gt 1"),
            FilterExpr::not(FilterExpr::or(vec![
                Column::new("Title").contains("Budget"),
                Column::new("ID").lt(5),
            ])),
        ]);
        assert_eq!(expr.columns(), vec!["Language", "Title", "ID"]);
        assert!(FilterExpr::raw("ID gt 5").columns().is_empty());
    }
}
