use crate::error::ServiceError;
use model::{
    core::value::Value,
    records::row::{EntityRow, RowHandle},
};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// An entity as returned in a JSON payload. Fields stay raw JSON until read.
#[derive(Debug, Clone)]
pub struct JsonEntity {
    fields: Map<String, JsonValue>,
}

impl JsonEntity {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        JsonEntity { fields }
    }
}

impl EntityRow for JsonEntity {
    fn get(&self, column: &str) -> Value {
        self.fields
            .get(column)
            .map(Value::from_json)
            .unwrap_or(Value::Null)
    }
}

/// Accepts the verbose v2 shapes `{"d": {"results": [...]}}` and
/// `{"d": [...]}`, and the v4 shape `{"value": [...]}`.
pub fn parse_entity_page(body: &[u8]) -> Result<Vec<RowHandle>, ServiceError> {
    let root: JsonValue = serde_json::from_slice(body)
        .map_err(|e| ServiceError::Decode(format!("invalid JSON body: {e}")))?;

    let results = match (root.get("d"), root.get("value")) {
        (Some(JsonValue::Array(items)), _) => items,
        (Some(d), _) => match d.get("results") {
            Some(JsonValue::Array(items)) => items,
            _ => {
                return Err(ServiceError::Decode(
                    "payload has no `d.results` array".to_string(),
                ));
            }
        },
        (None, Some(JsonValue::Array(items))) => items,
        _ => {
            return Err(ServiceError::Decode(
                "payload has neither `d` nor `value`".to_string(),
            ));
        }
    };

    results
        .iter()
        .map(|item| match item {
            JsonValue::Object(fields) => Ok(Arc::new(JsonEntity::new(fields.clone())) as RowHandle),
            other => Err(ServiceError::Decode(format!(
                "expected an entity object, got {other}"
            ))),
        })
        .collect()
}

/// Body of a `/$count` request.
pub fn parse_count_body(body: &str) -> Result<usize, ServiceError> {
    body.trim()
        .trim_start_matches('\u{feff}')
        .parse()
        .map_err(|_| ServiceError::Decode(format!("expected a row count, got '{body}'")))
}
