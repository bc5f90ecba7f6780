//! # Schema Matcher
//!
//! Finds the component whose top-level field names best overlap a shape
//! extracted from the docs (Jaccard similarity). One lookup per shape; nested
//! objects are matched independently by the caller.

use super::library::{fingerprint, normalize_field, ComponentLibrary, ComponentRef};
use crate::error::{AppError, AppResult};
use crate::mdx::{ParamSpec, ParamType};
use crate::type_mapping::json_type_name;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

/// Envelope keys of KDF requests that never belong to a parameter shape.
const ENVELOPE_KEYS: &[&str] = &["userpass", "method", "mmrpc", "id"];

/// Field names and types of a parameter set or example body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape {
    /// Normalized field name mapped to its JSON type.
    pub fields: BTreeMap<String, String>,
}

impl Shape {
    /// Shape of the top-level parameters in `params`.
    pub fn from_params<'a>(params: impl IntoIterator<Item = &'a ParamSpec>) -> Self {
        let fields = params
            .into_iter()
            .filter(|p| p.is_top_level())
            .map(|p| (normalize_field(&p.path), schema_type(p).to_string()))
            .collect();
        Self { fields }
    }

    /// Shape of the direct children of `parent` (used for nested objects).
    pub fn from_children<'a>(parent: &str, params: impl IntoIterator<Item = &'a ParamSpec>) -> Self {
        let fields = params
            .into_iter()
            .filter(|p| p.parent_path() == Some(parent))
            .map(|p| (normalize_field(p.leaf_name()), schema_type(p).to_string()))
            .collect();
        Self { fields }
    }

    /// Shape of a JSON object, without request envelope keys.
    pub fn from_json(value: &JsonValue) -> Self {
        let fields = value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (normalize_field(k), json_type_name(v).to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Self { fields }
    }

    /// Whether the shape has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Structural hash, comparable with `ComponentRef::shape_fingerprint`.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.fields)
    }

    fn names(&self) -> BTreeSet<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
}

fn schema_type(param: &ParamSpec) -> &'static str {
    match param.kind {
        ParamType::String | ParamType::Enum => "string",
        ParamType::Number => "number",
        ParamType::Bool => "boolean",
        ParamType::Object => "object",
        ParamType::Array => "array",
    }
}

/// Jaccard similarity of two name sets. Two empty sets score 0.
pub fn similarity(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Stateless matcher over a borrowed library.
#[derive(Debug, Clone, Copy)]
pub struct SchemaMatcher<'a> {
    library: &'a ComponentLibrary,
    threshold: f64,
}

impl<'a> SchemaMatcher<'a> {
    /// Creates a matcher with the given acceptance threshold.
    pub fn new(library: &'a ComponentLibrary, threshold: f64) -> Self {
        Self { library, threshold }
    }

    /// The library being matched against.
    pub fn library(&self) -> &'a ComponentLibrary {
        self.library
    }

    /// Best component for `shape`, or `None` below the threshold.
    ///
    /// Equal scores prefer the shortest component name. A tie that survives
    /// that rule is `SchemaMatchAmbiguous`.
    pub fn match_shape(&self, shape: &Shape) -> AppResult<Option<&'a ComponentRef>> {
        if shape.is_empty() {
            return Ok(None);
        }
        let wanted = shape.names();

        let mut best: Vec<&'a ComponentRef> = Vec::new();
        let mut best_score = 0.0_f64;
        for component in self.library.components() {
            let names: BTreeSet<&str> = component.fields.keys().map(String::as_str).collect();
            let score = similarity(&wanted, &names);
            if score < self.threshold || score == 0.0 {
                continue;
            }
            if score > best_score + f64::EPSILON {
                best_score = score;
                best = vec![component];
            } else if (score - best_score).abs() <= f64::EPSILON {
                best.push(component);
            }
        }

        let Some(shortest) = best.iter().map(|c| c.name.len()).min() else {
            return Ok(None);
        };
        let mut finalists: Vec<&'a ComponentRef> =
            best.into_iter().filter(|c| c.name.len() == shortest).collect();

        if finalists.len() > 1 {
            // identical schemas published under several refs are not ambiguous
            let first = finalists[0];
            if finalists
                .iter()
                .all(|c| c.name == first.name && c.shape_fingerprint == first.shape_fingerprint)
            {
                return Ok(Some(first));
            }
            let mut candidates: Vec<String> = finalists.iter().map(|c| c.source_path.clone()).collect();
            candidates.sort();
            return Err(AppError::SchemaMatchAmbiguous { candidates });
        }

        let matched = finalists.pop();
        if let Some(c) = matched {
            tracing::debug!(component = %c.name, score = best_score, "Schema matched");
        }
        Ok(matched)
    }
}
