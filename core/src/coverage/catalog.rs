//! # Method Catalog
//!
//! A per-version set of method names, optionally with the parameter fields
//! each method takes. Catalogs describe the upstream source of truth as well
//! as what was emitted, so both can be compared against the registry.

use crate::error::{AppError, AppResult};
use crate::mdx::{ParamType, ParsedDoc};
use crate::oas::OpenApiPathItem;
use crate::registry::ApiVersion;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One parameter field of a catalogued method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogField {
    /// Dotted field path.
    pub path: String,
    /// Type name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Method names (and optional field lists) per version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodCatalog {
    versions: BTreeMap<ApiVersion, BTreeMap<String, Option<Vec<CatalogField>>>>,
}

impl MethodCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method. Field lists of repeated names are replaced only when
    /// the new entry carries one.
    pub fn insert(&mut self, version: ApiVersion, name: &str, fields: Option<Vec<CatalogField>>) {
        let methods = self.versions.entry(version).or_default();
        match methods.get_mut(name) {
            Some(existing) if fields.is_some() => *existing = fields,
            Some(_) => {}
            None => {
                methods.insert(name.to_string(), fields);
            }
        }
    }

    /// Merges another catalog into this one.
    pub fn extend(&mut self, other: MethodCatalog) {
        for (version, methods) in other.versions {
            for (name, fields) in methods {
                self.insert(version, &name, fields);
            }
        }
    }

    /// Method names of a version, sorted.
    pub fn names(&self, version: ApiVersion) -> impl Iterator<Item = &str> {
        self.versions
            .get(&version)
            .into_iter()
            .flat_map(|m| m.keys().map(String::as_str))
    }

    /// Whether a method is present.
    pub fn contains(&self, version: ApiVersion, name: &str) -> bool {
        self.versions
            .get(&version)
            .is_some_and(|m| m.contains_key(name))
    }

    /// Field list of a method, if one is known.
    pub fn fields(&self, version: ApiVersion, name: &str) -> Option<&[CatalogField]> {
        self.versions.get(&version)?.get(name)?.as_deref()
    }

    /// Versions with at least one method.
    pub fn versions(&self) -> impl Iterator<Item = ApiVersion> + '_ {
        self.versions.keys().copied()
    }

    /// Total number of methods.
    pub fn len(&self) -> usize {
        self.versions.values().map(BTreeMap::len).sum()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Method names per version in the simple upstream shape
    /// (`{"v1": [...], "v2": [...]}`), readable by [`MethodCatalog::parse_json`].
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .versions
            .iter()
            .map(|(version, methods)| {
                let names = methods.keys().cloned().map(JsonValue::String).collect();
                (version.as_str().to_string(), JsonValue::Array(names))
            })
            .collect();
        JsonValue::Object(map)
    }

    /// Parses an upstream method list.
    ///
    /// Accepted shapes:
    /// - `{"v1": [...], "v2": [...]}`
    /// - `{"repository_data": {"v1": {"methods": [...]}}}`
    ///
    /// Entries are names or `{"name"|"method": ..., "params": [...]}`; params
    /// are names or `{"name"|"path": ..., "type": ...}`. Unknown top-level
    /// keys (timestamps, metadata) are skipped.
    pub fn parse_json(text: &str) -> AppResult<Self> {
        let root: JsonValue = serde_json::from_str(text)
            .map_err(|e| AppError::General(format!("Invalid method list JSON: {}", e)))?;
        let data = root.get("repository_data").unwrap_or(&root);
        let data = data
            .as_object()
            .ok_or_else(|| AppError::General("Method list root must be an object".into()))?;

        let mut catalog = Self::new();
        for (key, value) in data {
            let Some(version) = ApiVersion::parse(key) else {
                tracing::debug!(key = %key, "Skipping non-version key in method list");
                continue;
            };
            let entries = value.get("methods").unwrap_or(value);
            match entries {
                JsonValue::Array(items) => {
                    for item in items {
                        let (name, fields) = parse_entry(item)?;
                        catalog.insert(version, &name, fields);
                    }
                }
                JsonValue::Object(map) => {
                    for (name, params) in map {
                        catalog.insert(version, name, parse_fields(params));
                    }
                }
                JsonValue::Null => {}
                other => {
                    return Err(AppError::General(format!(
                        "Unexpected method list for {}: {}",
                        version, other
                    )))
                }
            }
            // registers the version even when its list is empty
            catalog.versions.entry(version).or_default();
        }
        Ok(catalog)
    }

    /// Catalog of emitted path items; fields are parameter names plus the
    /// dotted properties of inline object schemas.
    pub fn from_path_items<'a>(items: impl IntoIterator<Item = &'a OpenApiPathItem>) -> Self {
        let mut catalog = Self::new();
        for item in items {
            let mut fields = Vec::new();
            for param in &item.parameters {
                let Some(name) = param.get("name").and_then(JsonValue::as_str) else {
                    continue;
                };
                collect_schema_fields(name, param.get("schema"), &mut fields);
            }
            catalog.insert(item.version, &item.operation_id, Some(fields));
        }
        catalog
    }

    /// Replaces the field lists of methods already present with the ones
    /// `other` carries. Methods only in `other` are not added.
    pub fn overlay_fields(&mut self, other: &MethodCatalog) {
        for (version, methods) in self.versions.iter_mut() {
            for (name, fields) in methods.iter_mut() {
                if let Some(documented) = other.fields(*version, name) {
                    *fields = Some(documented.to_vec());
                }
            }
        }
    }

    /// Adds a method with the fields of its parsed page.
    pub fn insert_parsed(&mut self, version: ApiVersion, name: &str, doc: &ParsedDoc) {
        let fields = doc
            .parameters
            .iter()
            .map(|p| CatalogField {
                path: p.path.clone(),
                kind: Some(type_name(p.kind).to_string()),
            })
            .collect();
        self.insert(version, name, Some(fields));
    }
}

fn type_name(kind: ParamType) -> &'static str {
    match kind {
        ParamType::String | ParamType::Enum => "string",
        ParamType::Number => "number",
        ParamType::Bool => "boolean",
        ParamType::Object => "object",
        ParamType::Array => "array",
    }
}

fn collect_schema_fields(path: &str, schema: Option<&JsonValue>, out: &mut Vec<CatalogField>) {
    let kind = schema
        .and_then(|s| s.get("type"))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    out.push(CatalogField {
        path: path.to_string(),
        kind,
    });
    if let Some(props) = schema
        .and_then(|s| s.get("properties"))
        .and_then(JsonValue::as_object)
    {
        for (name, child) in props {
            collect_schema_fields(&format!("{}.{}", path, name), Some(child), out);
        }
    }
}

fn parse_entry(item: &JsonValue) -> AppResult<(String, Option<Vec<CatalogField>>)> {
    match item {
        JsonValue::String(name) => Ok((name.clone(), None)),
        JsonValue::Object(map) => {
            let name = ["name", "method", "method_name"]
                .iter()
                .find_map(|k| map.get(*k).and_then(JsonValue::as_str))
                .ok_or_else(|| AppError::General(format!("Method entry without a name: {}", item)))?;
            let fields = map
                .get("params")
                .or_else(|| map.get("parameters"))
                .and_then(parse_fields);
            Ok((name.to_string(), fields))
        }
        other => Err(AppError::General(format!("Unexpected method entry: {}", other))),
    }
}

fn parse_fields(params: &JsonValue) -> Option<Vec<CatalogField>> {
    let items = params.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|p| match p {
                JsonValue::String(name) => Some(CatalogField {
                    path: name.clone(),
                    kind: None,
                }),
                JsonValue::Object(map) => {
                    let path = map
                        .get("name")
                        .or_else(|| map.get("path"))
                        .and_then(JsonValue::as_str)?;
                    Some(CatalogField {
                        path: path.to_string(),
                        kind: map.get("type").and_then(JsonValue::as_str).map(str::to_string),
                    })
                }
                _ => None,
            })
            .collect(),
    )
}
