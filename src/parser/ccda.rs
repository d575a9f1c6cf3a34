//! C-CDA XML document parser.

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use super::InputParser;
use crate::core::DataType;
use crate::error::{ErrorCode, FhirConverterError, Result};

/// Key under which element text content is stored.
pub const TEXT_KEY: &str = "_";

#[derive(Debug, Clone, Copy, Default)]
pub struct CcdaParser;

impl CcdaParser {
    pub fn new() -> Self {
        Self
    }
}

impl InputParser for CcdaParser {
    fn data_type(&self) -> DataType {
        DataType::Ccda
    }

    fn parse(&self, data: &str) -> Result<Value> {
        if data.trim().is_empty() {
            return Err(FhirConverterError::new(
                ErrorCode::NullOrEmptyInput,
                "C-CDA input is null or empty",
            ));
        }

        let document = Document::parse(data.trim_start_matches('\u{feff}')).map_err(|e| {
            FhirConverterError::with_source(
                ErrorCode::InvalidCcdaDocument,
                format!("Invalid C-CDA document: {e}"),
                e,
            )
        })?;

        let root = document.root_element();
        let mut model = Map::new();
        model.insert(root.tag_name().name().to_string(), element_to_value(root));

        tracing::debug!(root = root.tag_name().name(), "Parsed C-CDA document");
        Ok(Value::Object(model))
    }
}

fn element_to_value(node: Node) -> Value {
    let mut map = Map::new();

    for attribute in node.attributes() {
        let key = match attribute.namespace().and_then(|ns| node.lookup_prefix(ns)) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", attribute.name()),
            _ => attribute.name().to_string(),
        };
        map.insert(key, Value::String(attribute.value().to_string()));
    }

    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            insert_child(&mut map, child.tag_name().name(), element_to_value(child));
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    if !text.is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }

    Value::Object(map)
}

/// Repeated children become an array; a single child stays an object.
fn insert_child(map: &mut Map<String, Value>, name: &str, value: Value) {
    match map.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name.to_string(), value);
        }
    }
}
