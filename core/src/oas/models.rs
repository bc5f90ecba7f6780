#![deny(missing_docs)]

//! # Path Item Model
//!
//! One emitted OpenAPI operation plus the path key and HTTP method it lives
//! under. Serialization fixes the key order so reruns are byte-identical.

use crate::error::{AppError, AppResult};
use crate::registry::ApiVersion;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

/// Custom extension holding the originating MDX path.
pub const MDX_DOC_PATH_KEY: &str = "x-mdx-doc-path";

/// Custom extension listing parser review flags.
pub const REVIEW_FLAGS_KEY: &str = "x-review-flags";

/// Marker placed in descriptions of schemas that need a human pass.
pub const TODO_MARKER: &str = "TODO";

/// HTTP methods recognized when reading path files back.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// A single operation in a path file.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenApiPathItem {
    /// API version of the method.
    pub version: ApiVersion,
    /// URL-like path key, e.g. `/api/v1/validateaddress`.
    pub path_key: String,
    /// Lowercase HTTP method.
    pub http_method: String,
    /// Always equal to the method name.
    pub operation_id: String,
    /// Short summary (page title).
    pub summary: String,
    /// Long description.
    pub description: String,
    /// `x-` extensions, in insertion order.
    pub custom_fields: IndexMap<String, JsonValue>,
    /// OpenAPI parameter objects.
    pub parameters: Vec<JsonValue>,
    /// OpenAPI request body object.
    pub request_body: Option<JsonValue>,
    /// Responses keyed by status code (or `default`).
    pub responses: IndexMap<String, JsonValue>,
}

impl OpenApiPathItem {
    /// The operation object: operationId, summary, description, extensions,
    /// parameters, requestBody, responses.
    pub fn to_operation(&self) -> JsonValue {
        let mut op = Map::new();
        op.insert("operationId".into(), JsonValue::String(self.operation_id.clone()));
        op.insert("summary".into(), JsonValue::String(self.summary.clone()));
        op.insert("description".into(), JsonValue::String(self.description.clone()));
        for (key, value) in &self.custom_fields {
            op.insert(key.clone(), value.clone());
        }
        if !self.parameters.is_empty() {
            op.insert("parameters".into(), JsonValue::Array(self.parameters.clone()));
        }
        if let Some(body) = &self.request_body {
            op.insert("requestBody".into(), body.clone());
        }
        let responses: Map<String, JsonValue> = self
            .responses
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        op.insert("responses".into(), JsonValue::Object(responses));
        JsonValue::Object(op)
    }

    /// `{path_key: {http_method: operation}}`.
    pub fn to_document(&self) -> JsonValue {
        let mut methods = Map::new();
        methods.insert(self.http_method.clone(), self.to_operation());
        let mut doc = Map::new();
        doc.insert(self.path_key.clone(), JsonValue::Object(methods));
        JsonValue::Object(doc)
    }

    /// Reads every operation of a path file.
    pub fn from_document(doc: &JsonValue, version: ApiVersion) -> AppResult<Vec<Self>> {
        let paths = doc
            .as_object()
            .ok_or_else(|| AppError::InvalidOutput("path file root is not a mapping".into()))?;

        let mut items = Vec::new();
        for (path_key, methods) in paths {
            let Some(methods) = methods.as_object() else {
                continue;
            };
            for (method, op) in methods {
                if !HTTP_METHODS.contains(&method.as_str()) {
                    continue;
                }
                items.push(Self::from_operation(path_key, method, op, version)?);
            }
        }
        Ok(items)
    }

    fn from_operation(path_key: &str, method: &str, op: &JsonValue, version: ApiVersion) -> AppResult<Self> {
        let text = |key: &str| op.get(key).and_then(JsonValue::as_str).unwrap_or_default().to_string();
        let operation_id = text("operationId");
        if operation_id.is_empty() {
            return Err(AppError::InvalidOutput(format!(
                "operation {} {} has no operationId",
                method, path_key
            )));
        }

        let custom_fields = op
            .as_object()
            .map(|m| {
                m.iter()
                    .filter(|(k, _)| k.starts_with("x-"))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let responses = op
            .get("responses")
            .and_then(JsonValue::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Ok(Self {
            version,
            path_key: path_key.to_string(),
            http_method: method.to_string(),
            operation_id,
            summary: text("summary"),
            description: text("description"),
            custom_fields,
            parameters: op
                .get("parameters")
                .and_then(JsonValue::as_array)
                .cloned()
                .unwrap_or_default(),
            request_body: op.get("requestBody").cloned(),
            responses,
        })
    }

    /// The `x-mdx-doc-path` extension, if set.
    pub fn mdx_doc_path(&self) -> Option<&str> {
        self.custom_fields.get(MDX_DOC_PATH_KEY).and_then(JsonValue::as_str)
    }

    /// `requestBody.content["application/json"].example`.
    pub fn request_example(&self) -> Option<&JsonValue> {
        self.request_body
            .as_ref()?
            .pointer("/content/application~1json/example")
    }

    /// Names of top-level parameter objects.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter_map(|p| p.get("name").and_then(JsonValue::as_str))
            .collect()
    }
}
