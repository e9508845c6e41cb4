use crate::core::value::Value;
use serde::Serialize;
use std::sync::Arc;

/// A row handle returned by the fetch layer.
///
/// Implementations keep whatever raw representation the service returned and
/// convert a field only when `get` is called. Callers must not assume the
/// conversion is cheap or cached.
pub trait EntityRow: Send + Sync {
    /// Reads one column. Unknown columns read as `Value::Null`.
    fn get(&self, column: &str) -> Value;
}

pub type RowHandle = Arc<dyn EntityRow>;

#[derive(Debug, Clone, Serialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

/// An already-materialized row, used for locally constructed entities.
#[derive(Debug, Clone, Serialize)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn from_pairs<K, V>(entity: &str, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let field_values = pairs
            .into_iter()
            .map(|(name, value)| FieldValue {
                name: name.into(),
                value: value.into(),
            })
            .collect();
        RowData::new(entity, field_values)
    }

    pub fn field(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn into_handle(self) -> RowHandle {
        Arc::new(self)
    }
}

impl EntityRow for RowData {
    fn get(&self, column: &str) -> Value {
        self.field(column)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }
}
