use serde::{Deserialize, Serialize};

/// A table exposed by the service with its columns in declared order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        TableSchema {
            name: name.into(),
            columns,
        }
    }
}
