//! # Component Library
//!
//! Loads the component schema directory once per run. Each YAML/JSON file is
//! either a map of named schemas or a single schema named after its stem.

use crate::error::{AppError, AppResult};
use crate::oas::ref_utils::{decode_pointer_segment, parse_reference};
use crate::type_mapping::json_type_name;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};
use walkdir::WalkDir;

const SCHEMA_KEYWORDS: &[&str] = &[
    "type", "properties", "allOf", "oneOf", "anyOf", "$ref", "enum", "items",
];

/// A named, reusable schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRef {
    /// Schema name (map key or file stem).
    pub name: String,
    /// `$ref` string pointing at the schema from an emitted path file.
    pub source_path: String,
    /// SHA-256 (hex) of the sorted `field:type` pairs.
    pub shape_fingerprint: String,
    /// Normalized top-level field names mapped to their JSON type.
    pub fields: BTreeMap<String, String>,
    /// File path relative to the component directory, `/`-separated.
    pub file: String,
}

/// Read-only set of components, passed explicitly to matcher and emitter.
#[derive(Debug, Clone, Default)]
pub struct ComponentLibrary {
    components: Vec<ComponentRef>,
}

impl ComponentLibrary {
    /// Builds a library from already constructed components.
    pub fn new(mut components: Vec<ComponentRef>) -> Self {
        components.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Self { components }
    }

    /// Recursively loads every `.yaml`, `.yml` and `.json` file under `dir`.
    pub fn load(dir: &Path, ref_prefix: &str) -> AppResult<Self> {
        let mut components = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| AppError::General(format!("Failed to walk {:?}: {}", dir, e)))?;
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !entry.file_type().is_file() || !matches!(ext, "yaml" | "yml" | "json") {
                continue;
            }
            let rel = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => s.to_str(),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            let text = fs::read_to_string(path)?;
            let loaded = parse_component_file(&rel, &text, ref_prefix)?;
            tracing::debug!(file = %rel, schemas = loaded.len(), "Loaded component file");
            components.extend(loaded);
        }
        tracing::info!(count = components.len(), dir = ?dir, "Component library loaded");
        Ok(Self::new(components))
    }

    /// All components, sorted by `source_path`.
    pub fn components(&self) -> &[ComponentRef] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Resolves a `$ref` string in one step. Relative prefixes (`../`, `./`)
    /// are ignored; the file and the fragment name must both match.
    pub fn resolve_ref(&self, reference: &str) -> Option<&ComponentRef> {
        if let Some(exact) = self.components.iter().find(|c| c.source_path == reference) {
            return Some(exact);
        }
        let parsed = parse_reference(reference);
        let wanted_file = strip_relative(parsed.document);
        let wanted_name = parsed
            .fragment
            .and_then(|f| f.trim_start_matches('/').rsplit('/').next())
            .map(decode_pointer_segment);

        self.components.iter().find(|c| {
            let file_matches = !wanted_file.is_empty()
                && (c.file == wanted_file || c.file.ends_with(&format!("/{}", wanted_file)));
            let name_matches = match &wanted_name {
                Some(name) => &c.name == name,
                None => !c.source_path.contains('#'),
            };
            file_matches && name_matches
        })
    }
}

fn strip_relative(document: &str) -> String {
    Path::new(document)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .skip_while(|s| *s == "components" || *s == "schemas")
        .collect::<Vec<_>>()
        .join("/")
}

/// Parses one component file into its schemas.
pub fn parse_component_file(rel_file: &str, text: &str, ref_prefix: &str) -> AppResult<Vec<ComponentRef>> {
    let value: JsonValue = if rel_file.ends_with(".json") {
        serde_json::from_str(text)
            .map_err(|e| AppError::General(format!("Invalid component file {}: {}", rel_file, e)))?
    } else {
        serde_yaml::from_str(text)
            .map_err(|e| AppError::General(format!("Invalid component file {}: {}", rel_file, e)))?
    };

    // Bundled OpenAPI documents keep their schemas under components.schemas.
    let value = value
        .pointer("/components/schemas")
        .cloned()
        .unwrap_or(value);

    let Some(map) = value.as_object() else {
        return Ok(Vec::new());
    };

    if is_schema(&value) {
        let stem = Path::new(rel_file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(rel_file)
            .to_string();
        return Ok(vec![component(
            stem,
            format!("{}{}", ref_prefix, rel_file),
            rel_file,
            &value,
        )]);
    }

    Ok(map
        .iter()
        .filter(|(_, schema)| schema.is_object())
        .map(|(name, schema)| {
            component(
                name.clone(),
                format!("{}{}#/{}", ref_prefix, rel_file, name),
                rel_file,
                schema,
            )
        })
        .collect())
}

fn is_schema(value: &JsonValue) -> bool {
    value
        .as_object()
        .is_some_and(|m| SCHEMA_KEYWORDS.iter().any(|k| m.contains_key(*k)))
}

fn component(name: String, source_path: String, rel_file: &str, schema: &JsonValue) -> ComponentRef {
    let fields = schema_fields(schema);
    ComponentRef {
        name,
        source_path,
        shape_fingerprint: fingerprint(&fields),
        fields,
        file: rel_file.to_string(),
    }
}

/// Top-level properties of a schema, including inline `allOf` members.
/// `$ref` members are not followed.
pub fn schema_fields(schema: &JsonValue) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if let Some(props) = schema.get("properties").and_then(JsonValue::as_object) {
        for (name, prop) in props {
            fields.insert(normalize_field(name), property_type(prop));
        }
    }
    if let Some(members) = schema.get("allOf").and_then(JsonValue::as_array) {
        for member in members.iter().filter(|m| m.get("$ref").is_none()) {
            fields.extend(schema_fields(member));
        }
    }
    fields
}

fn property_type(prop: &JsonValue) -> String {
    match prop.get("type") {
        Some(JsonValue::String(t)) => t.clone(),
        // OpenAPI 3.1 allows `type: [string, "null"]`
        Some(JsonValue::Array(types)) => types
            .iter()
            .filter_map(JsonValue::as_str)
            .find(|t| *t != "null")
            .unwrap_or("null")
            .to_string(),
        _ if prop.get("$ref").is_some() || prop.get("properties").is_some() => "object".into(),
        _ if prop.get("enum").is_some() => "string".into(),
        _ => prop
            .get("example")
            .map(json_type_name)
            .unwrap_or("any")
            .to_string(),
    }
}

/// Normalizes a field name for set comparison.
pub fn normalize_field(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Structural hash of `name:type` pairs (sorted by name).
pub fn fingerprint(fields: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, kind) in fields {
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(kind.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
