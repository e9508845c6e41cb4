use model::core::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn as_odata(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Ge => "ge",
            Comparator::Lt => "lt",
            Comparator::Le => "le",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_odata())
    }
}

/// `column <comparator> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, comparator: Comparator, value: impl Into<Value>) -> Self {
        Condition {
            column: column.into(),
            comparator,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::new(column, Comparator::Eq, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMatch {
    StartsWith,
    EndsWith,
    Contains,
}
