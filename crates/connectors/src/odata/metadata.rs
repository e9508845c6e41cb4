use crate::error::ServiceError;
use model::schema::table::TableSchema;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::collections::HashMap;
use tracing::warn;

/// Entity sets and their columns as declared by a `$metadata` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMetadata {
    pub tables: Vec<TableSchema>,
}

impl ServiceMetadata {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

/// Parses a CSDL (EDMX) document.
///
/// Tables are the `EntitySet`s of the entity container in document order;
/// each set's columns are the `Property` names of its `EntityType`.
/// Navigation properties are not columns.
pub fn parse_metadata(xml: &str) -> Result<ServiceMetadata, ServiceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut types: HashMap<String, Vec<String>> = HashMap::new();
    let mut sets: Vec<(String, String)> = Vec::new();
    let mut current_type: Option<String> = None;

    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"EntityType" => {
                    let name = required_attr(&e, "Name")?;
                    types.entry(name.clone()).or_default();
                    current_type = Some(name);
                }
                b"Property" => push_property(&e, &current_type, &mut types)?,
                b"EntitySet" => sets.push(entity_set(&e)?),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"EntityType" => {
                    types.entry(required_attr(&e, "Name")?).or_default();
                }
                b"Property" => push_property(&e, &current_type, &mut types)?,
                b"EntitySet" => sets.push(entity_set(&e)?),
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"EntityType" => current_type = None,
            Event::Eof => break,
            _ => {}
        }
    }

    let tables = sets
        .into_iter()
        .map(|(set_name, type_name)| {
            let columns = types.get(&type_name).cloned().unwrap_or_else(|| {
                warn!("Entity set {set_name} refers to unknown type {type_name}");
                Vec::new()
            });
            TableSchema::new(set_name, columns)
        })
        .collect();

    Ok(ServiceMetadata { tables })
}

fn push_property(
    e: &BytesStart<'_>,
    current_type: &Option<String>,
    types: &mut HashMap<String, Vec<String>>,
) -> Result<(), ServiceError> {
    // Properties outside an EntityType belong to complex types
    if let Some(type_name) = current_type {
        let name = required_attr(e, "Name")?;
        types.entry(type_name.clone()).or_default().push(name);
    }
    Ok(())
}

/// `(set name, unqualified entity type name)`
fn entity_set(e: &BytesStart<'_>) -> Result<(String, String), ServiceError> {
    let name = required_attr(e, "Name")?;
    let qualified = required_attr(e, "EntityType")?;
    let type_name = qualified
        .rsplit('.')
        .next()
        .unwrap_or(qualified.as_str())
        .to_string();
    Ok((name, type_name))
}

fn required_attr(e: &BytesStart<'_>, key: &str) -> Result<String, ServiceError> {
    let attr = e.try_get_attribute(key).map_err(decode_err)?.ok_or_else(|| {
        ServiceError::Decode(format!(
            "<{}> is missing attribute {key}",
            String::from_utf8_lossy(e.local_name().as_ref())
        ))
    })?;
    let value = attr.unescape_value().map_err(decode_err)?;
    Ok(value.into_owned())
}

fn decode_err(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Decode(format!("invalid $metadata document: {err}"))
}
