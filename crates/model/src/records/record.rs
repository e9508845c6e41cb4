use crate::core::value::Value;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::sync::Arc;

/// A fully resolved row: every column read once, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// `values` must be positionally aligned with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Record { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_column_order() {
        let columns: Arc<[String]> = vec!["b".to_string(), "a".to_string()].into();
        let record = Record::new(columns, vec![Value::Int(1), Value::from("x")]);

        assert_eq!(record.get("a"), Some(&Value::from("x")));
        assert_eq!(record.get("c"), None);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"b":1,"a":"x"}"#);
    }
}
