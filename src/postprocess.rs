//! Normalization of rendered template output.
//!
//! Templates build JSON by string concatenation, which tends to leave
//! dangling commas, the same resource emitted by several templates, and
//! empty placeholders for data the message did not carry. Post-processing
//! turns that into clean JSON.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{ErrorCode, FhirConverterError, Result};

/// Parse, merge, prune and pretty-print rendered output.
pub fn process(rendered: &str) -> Result<String> {
    let cleaned = remove_dangling_commas(rendered);
    let mut value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        FhirConverterError::with_source(
            ErrorCode::JsonParsingError,
            format!("Rendered output is not valid JSON: {e}"),
            e,
        )
    })?;

    merge_bundle_entries(&mut value);
    prune_empty(&mut value);

    serde_json::to_string_pretty(&value).map_err(|e| {
        FhirConverterError::with_source(
            ErrorCode::JsonParsingError,
            format!("Failed to serialize converted output: {e}"),
            e,
        )
    })
}

/// Drop commas that do not separate two values: trailing commas before `}`
/// or `]`, leading commas after `{` or `[`, and repeated commas. String
/// literals are left untouched.
pub fn remove_dangling_commas(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in input.char_indices() {
        if in_string {
            output.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                output.push(c);
            }
            ',' => {
                let previous = output.trim_end().chars().last();
                let next = input[index + 1..].trim_start().chars().next();
                let dangling = matches!(previous, None | Some('{' | '[' | ','))
                    || matches!(next, None | Some('}' | ']' | ','));
                if !dangling {
                    output.push(c);
                }
            }
            _ => output.push(c),
        }
    }

    output
}

/// Merge `entry` elements that describe the same resource, keyed by
/// `resourceType` and `id`, keeping the position of the first occurrence.
pub fn merge_bundle_entries(value: &mut Value) {
    let Some(entries) = value.get_mut("entry").and_then(Value::as_array_mut) else {
        return;
    };

    let mut merged: Vec<Value> = Vec::with_capacity(entries.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for entry in entries.drain(..) {
        match resource_key(&entry) {
            Some(key) => match positions.get(&key) {
                Some(&position) => merge_values(&mut merged[position], entry),
                None => {
                    positions.insert(key, merged.len());
                    merged.push(entry);
                }
            },
            None => merged.push(entry),
        }
    }

    *entries = merged;
}

fn resource_key(entry: &Value) -> Option<String> {
    let resource = entry.get("resource")?;
    let resource_type = resource.get("resourceType")?.as_str()?;
    let id = resource.get("id")?.as_str()?;
    Some(format!("{resource_type}/{id}"))
}

/// Deep merge: objects key-wise, arrays as a union, scalars from `source`
/// unless it is null or an empty string.
pub fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for item in source {
                if !target.contains(&item) {
                    target.push(item);
                }
            }
        }
        (_, Value::Null) => {}
        (_, Value::String(s)) if s.is_empty() => {}
        (target, source) => *target = source,
    }
}

/// Recursively remove nulls, empty strings, empty arrays and empty objects.
/// Returns whether `value` itself is empty afterwards.
pub fn prune_empty(value: &mut Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => {
            items.retain_mut(|item| !prune_empty(item));
            items.is_empty()
        }
        Value::Object(map) => {
            prune_object(map);
            map.is_empty()
        }
        _ => false,
    }
}

fn prune_object(map: &mut Map<String, Value>) {
    map.retain(|_, value| !prune_empty(value));
}
