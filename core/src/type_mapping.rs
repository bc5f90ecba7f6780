#![deny(missing_docs)]

//! # Type Mapping
//!
//! Converts documentation type cells (`string`, `integer`, `array of objects`,
//! `[CoinProtocol](...)`) and JSON example values into JSON Schema fragments.

use crate::mdx::ParamType;
use regex::Regex;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Result of mapping a type cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    /// Normalized type.
    pub kind: ParamType,
    /// Allowed values, when the cell or description enumerates them.
    pub enum_values: Option<BTreeSet<String>>,
}

/// Trait for converting documentation type strings to parameter types.
pub trait TypeMapper {
    /// Maps a type cell (with its row description for enum detection).
    fn map(&self, raw_type: &str, description: &str) -> MappedType;
}

/// Keyword-driven mapper matching the conventions of the KDF docs tables.
#[derive(Debug, Clone, Default)]
pub struct DocTypeMapper;

impl TypeMapper for DocTypeMapper {
    fn map(&self, raw_type: &str, description: &str) -> MappedType {
        let lower = raw_type.trim().to_ascii_lowercase();
        let enum_values = extract_enum_values(raw_type).or_else(|| extract_enum_values(description));

        let kind = if lower.contains("enum") {
            ParamType::Enum
        } else if lower.starts_with("array")
            || lower.starts_with("list")
            || lower.contains("array of")
            || lower.contains("list of")
            || lower.ends_with("[]")
            || lower.starts_with("vec<")
        {
            ParamType::Array
        } else if lower.contains("bool") {
            ParamType::Bool
        } else if is_numeric_type(&lower) {
            ParamType::Number
        } else if lower.is_empty()
            || lower.contains("string")
            || lower == "str"
            || lower.contains("text")
        {
            ParamType::String
        } else if lower.contains("object")
            || lower.contains("map")
            || lower.contains("dict")
            || lower.contains("struct")
            || is_structure_reference(raw_type)
        {
            ParamType::Object
        } else {
            ParamType::String
        };

        // An enumerated string is an enum even when the type cell just says "string".
        let kind = match (&kind, &enum_values) {
            (ParamType::String, Some(_)) => ParamType::Enum,
            _ => kind,
        };
        let enum_values = if kind == ParamType::Enum { enum_values } else { None };

        MappedType { kind, enum_values }
    }
}

fn is_numeric_type(lower: &str) -> bool {
    ["integer", "int", "number", "float", "decimal", "numeric", "u8", "u16", "u32", "u64", "i32", "i64", "f64"]
        .iter()
        .any(|k| lower == *k || lower.starts_with(k))
        && !lower.contains("string")
}

/// Whether a type cell is a link to (or the name of) a documented structure.
fn is_structure_reference(raw_type: &str) -> bool {
    let trimmed = raw_type.trim();
    trimmed.starts_with('[')
        || trimmed
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase())
}

fn enum_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:one of|either|possible values|options|allowed values|values)\s*(?:are|is)?\s*:?\s*(.+)")
            .expect("static regex")
    })
}

fn backtick_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("static regex"))
}

/// Extracts backticked tokens following an enumeration phrase.
pub fn extract_enum_values(text: &str) -> Option<BTreeSet<String>> {
    let caps = enum_regex().captures(text)?;
    let tail = caps.get(1)?.as_str();
    let values: BTreeSet<String> = backtick_regex()
        .captures_iter(tail)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
        .collect();
    (values.len() >= 2).then_some(values)
}

/// JSON Schema for a scalar or container parameter type.
pub fn param_schema(kind: ParamType, raw_type: &str, enum_values: Option<&BTreeSet<String>>) -> JsonValue {
    match kind {
        ParamType::String => json!({"type": "string"}),
        ParamType::Number => {
            let lower = raw_type.to_ascii_lowercase();
            if lower.contains("int") || lower.starts_with('u') || lower.starts_with('i') {
                json!({"type": "integer"})
            } else {
                json!({"type": "number"})
            }
        }
        ParamType::Bool => json!({"type": "boolean"}),
        ParamType::Object => json!({"type": "object"}),
        ParamType::Array => json!({"type": "array", "items": {}}),
        ParamType::Enum => {
            let values: Vec<JsonValue> = enum_values
                .map(|set| set.iter().cloned().map(JsonValue::String).collect())
                .unwrap_or_default();
            if values.is_empty() {
                json!({"type": "string"})
            } else {
                json!({"type": "string", "enum": values})
            }
        }
    }
}

/// Infers a JSON Schema from an example value.
pub fn infer_schema(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Null => json!({"type": "null"}),
        JsonValue::Bool(_) => json!({"type": "boolean"}),
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                json!({"type": "integer"})
            } else {
                json!({"type": "number"})
            }
        }
        JsonValue::String(_) => json!({"type": "string"}),
        JsonValue::Array(items) => {
            let item_schema = items.first().map(infer_schema).unwrap_or_else(|| json!({}));
            json!({"type": "array", "items": item_schema})
        }
        JsonValue::Object(map) => {
            let mut properties = Map::new();
            for (k, v) in map {
                properties.insert(k.clone(), infer_schema(v));
            }
            json!({"type": "object", "properties": properties})
        }
    }
}

/// Short type name of a JSON value, used in structural fingerprints.
pub fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
