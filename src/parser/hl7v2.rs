//! HL7v2 pipe-delimited message parser.
//!
//! Produces a model indexed the way HL7 numbers things: `fields[n]` is field
//! `n` of a segment and `components[n]` is component `n` of a repetition, with
//! index 0 holding the whole value.

use serde_json::{Map, Value, json};

use super::InputParser;
use crate::core::DataType;
use crate::error::{ErrorCode, FhirConverterError, Result};

/// Delimiters declared in MSH-1 and MSH-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingCharacters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for EncodingCharacters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl EncodingCharacters {
    /// Read delimiters from the header segment.
    pub fn from_header(header: &str) -> Result<Self> {
        let mut chars = header.chars();
        let segment_id: String = chars.by_ref().take(3).collect();
        if segment_id != "MSH" {
            return Err(invalid_message("Message must start with an MSH segment"));
        }

        let field = chars
            .next()
            .ok_or_else(|| invalid_message("MSH segment is missing the field separator"))?;
        let declared: Vec<char> = chars.take_while(|c| *c != field).collect();
        // A fifth (truncation) character is allowed since v2.7
        if !(4..=5).contains(&declared.len()) {
            return Err(invalid_message(format!(
                "MSH-2 must declare 4 encoding characters, found {}",
                declared.len()
            )));
        }

        let mut seen = vec![field];
        for c in &declared {
            if seen.contains(c) || c.is_alphanumeric() || c.is_whitespace() {
                return Err(invalid_message(format!("Invalid encoding character '{c}'")));
            }
            seen.push(*c);
        }

        Ok(Self {
            field,
            component: declared[0],
            repetition: declared[1],
            escape: declared[2],
            subcomponent: declared[3],
        })
    }

    /// Decode `\F\`, `\S\`, `\T\`, `\R\`, `\E\` and `\.br\` escape sequences.
    /// Unknown or unterminated sequences are kept verbatim.
    pub fn unescape(&self, value: &str) -> String {
        if !value.contains(self.escape) {
            return value.to_string();
        }

        let mut result = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find(self.escape) {
            result.push_str(&rest[..start]);
            let after = &rest[start + self.escape.len_utf8()..];
            let Some(end) = after.find(self.escape) else {
                result.push_str(&rest[start..]);
                return result;
            };

            match &after[..end] {
                "F" => result.push(self.field),
                "S" => result.push(self.component),
                "T" => result.push(self.subcomponent),
                "R" => result.push(self.repetition),
                "E" => result.push(self.escape),
                ".br" => result.push('\n'),
                other => {
                    result.push(self.escape);
                    result.push_str(other);
                    result.push(self.escape);
                }
            }
            rest = &after[end + self.escape.len_utf8()..];
        }
        result.push_str(rest);
        result
    }
}

fn invalid_message(message: impl Into<String>) -> FhirConverterError {
    FhirConverterError::new(ErrorCode::InvalidHl7v2Message, message)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Hl7v2Parser;

impl Hl7v2Parser {
    pub fn new() -> Self {
        Self
    }

    fn parse_segment(
        &self,
        line: &str,
        index: usize,
        encoding: &EncodingCharacters,
    ) -> Result<Value> {
        let mut parts = line.split(encoding.field);
        let id = parts.next().unwrap_or_default();
        if id.len() != 3 || !id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(invalid_message(format!(
                "Invalid segment id '{id}' on segment {}",
                index + 1
            )));
        }

        let mut fields = vec![literal_field(id)];
        if id == "MSH" {
            fields.push(literal_field(&encoding.field.to_string()));
            fields.push(literal_field(parts.next().unwrap_or_default()));
        }
        fields.extend(parts.map(|raw| self.parse_field(raw, encoding)));

        Ok(json!({
            "id": id,
            "value": line,
            "fields": fields,
        }))
    }

    fn parse_field(&self, raw: &str, encoding: &EncodingCharacters) -> Value {
        let repeats: Vec<Value> = raw
            .split(encoding.repetition)
            .map(|repeat| {
                let mut components = vec![Value::String(encoding.unescape(repeat))];
                components.extend(
                    repeat
                        .split(encoding.component)
                        .map(|component| Value::String(encoding.unescape(component))),
                );
                json!({
                    "value": encoding.unescape(repeat),
                    "components": components,
                })
            })
            .collect();

        let components = repeats
            .first()
            .and_then(|repeat| repeat.get("components"))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        json!({
            "value": encoding.unescape(raw),
            "repeats": repeats,
            "components": components,
        })
    }
}

fn literal_field(value: &str) -> Value {
    json!({
        "value": value,
        "repeats": [{ "value": value, "components": [value] }],
        "components": [value],
    })
}

impl InputParser for Hl7v2Parser {
    fn data_type(&self) -> DataType {
        DataType::Hl7v2
    }

    fn parse(&self, data: &str) -> Result<Value> {
        let data = data.trim_start_matches('\u{feff}');
        if data.trim().is_empty() {
            return Err(FhirConverterError::new(
                ErrorCode::NullOrEmptyInput,
                "HL7v2 input is null or empty",
            ));
        }

        let lines: Vec<&str> = data
            .split(['\r', '\n'])
            .filter(|line| !line.trim().is_empty())
            .collect();
        let header = lines.first().map(|line| line.trim_start()).unwrap_or_default();
        let encoding = EncodingCharacters::from_header(header)?;

        let mut segments = Vec::with_capacity(lines.len());
        let mut by_id: Map<String, Value> = Map::new();
        for (index, line) in lines.iter().enumerate() {
            let line = if index == 0 { header } else { *line };
            let segment = self.parse_segment(line, index, &encoding)?;
            let id = line[..3].to_string();

            match by_id.get_mut(&id) {
                Some(Value::Array(group)) => group.push(segment.clone()),
                _ => {
                    by_id.insert(id, Value::Array(vec![segment.clone()]));
                }
            }
            segments.push(segment);
        }

        let mut model = Map::new();
        model.insert("segments".to_string(), Value::Array(segments));
        model.insert(
            "encodingCharacters".to_string(),
            json!({
                "field": encoding.field.to_string(),
                "component": encoding.component.to_string(),
                "repetition": encoding.repetition.to_string(),
                "escape": encoding.escape.to_string(),
                "subcomponent": encoding.subcomponent.to_string(),
            }),
        );
        model.extend(by_id);

        tracing::debug!(segments = lines.len(), "Parsed HL7v2 message");
        Ok(Value::Object(model))
    }
}
