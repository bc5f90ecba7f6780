//! # Data Models
//!
//! Intermediate Representation (IR) of a parsed MDX method page.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::fmt;

/// Type of a documented parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Text.
    String,
    /// Integer or float. `ParamSpec::raw_type` tells which.
    Number,
    /// Boolean.
    Bool,
    /// Nested structure.
    Object,
    /// List.
    Array,
    /// String restricted to `enum_values`.
    Enum,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Bool => "bool",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Enum => "enum",
        };
        f.write_str(s)
    }
}

/// Where a parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Query string.
    Query,
    /// URL path segment.
    Path,
    /// JSON request body.
    Body,
}

impl ParamLocation {
    /// OpenAPI `in` value, `None` for body parameters.
    pub fn openapi_in(&self) -> Option<&'static str> {
        match self {
            ParamLocation::Query => Some("query"),
            ParamLocation::Path => Some("path"),
            ParamLocation::Body => None,
        }
    }
}

/// One row of an argument table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Dotted field path, e.g. `cancel_by.data.ticker`.
    pub path: String,
    /// Normalized type.
    #[serde(rename = "type")]
    pub kind: ParamType,
    /// Type cell as written in the table.
    pub raw_type: String,
    /// Whether the parameter is mandatory.
    pub required: bool,
    /// Cleaned description cell.
    pub description: String,
    /// Where the parameter travels.
    pub location: ParamLocation,
    /// Allowed values when `kind` is `Enum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<BTreeSet<String>>,
    /// True when the row was created to parent a nested path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthesized: bool,
}

impl ParamSpec {
    /// Path of the direct parent, if nested.
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(parent, _)| parent)
    }

    /// Last path segment.
    pub fn leaf_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// First path segment.
    pub fn root_name(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }

    /// Whether the parameter is a top-level one.
    pub fn is_top_level(&self) -> bool {
        !self.path.contains('.')
    }
}

/// One row of a response table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Dotted field path within the response.
    pub path: String,
    /// Normalized type.
    #[serde(rename = "type")]
    pub kind: ParamType,
    /// Type cell as written.
    pub raw_type: String,
    /// Cleaned description.
    pub description: String,
}

/// Whether a code example shows a request or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleRole {
    /// Request payload.
    Request,
    /// Response payload.
    Response,
}

/// Content of a code example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleBody {
    /// Successfully parsed JSON.
    Json(JsonValue),
    /// Block that failed JSON parsing, kept verbatim for manual review.
    Raw(String),
}

/// A fenced JSON block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonExample {
    /// Request or response.
    pub role: ExampleRole,
    /// `success`, `error`, `error: NoSuchCoin`, ...
    pub status_label: String,
    /// Parsed content.
    pub body: ExampleBody,
}

impl JsonExample {
    /// Parsed JSON, if the block was valid.
    pub fn json(&self) -> Option<&JsonValue> {
        match &self.body {
            ExampleBody::Json(v) => Some(v),
            ExampleBody::Raw(_) => None,
        }
    }

    /// Whether the example documents an error.
    pub fn is_error(&self) -> bool {
        self.status_label.starts_with("error")
    }
}

/// Why something was flagged for manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// Required-ness could not be decided with confidence.
    AmbiguousRequired,
    /// A code block is not valid JSON.
    InvalidJson,
    /// A parameter path appears more than once.
    DuplicateParameter,
    /// A structural marker (title, examples) is missing.
    MissingMarker,
    /// A name cell holds several words; they were joined with `_`.
    MultiWordName,
}

/// A manual-review note attached to a parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFlag {
    /// Category.
    pub kind: ReviewKind,
    /// Human-readable detail (usually the offending path or heading).
    pub detail: String,
}

impl fmt::Display for ReviewFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = serde_json::to_value(self.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{}: {}", kind, self.detail)
    }
}

/// A secondary table describing a nested structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureTable {
    /// Nearest heading above the table.
    pub heading: String,
    /// Rows, parsed like parameters.
    pub fields: Vec<ParamSpec>,
}

/// Structured view of one MDX method page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDoc {
    /// `export const title`.
    pub title: String,
    /// `export const description`, or the first paragraph.
    pub description: String,
    /// First H1/H2 text (usually the method name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Prose and opaque markup, in document order.
    pub narrative_blocks: Vec<String>,
    /// Rows of the argument table.
    pub parameters: Vec<ParamSpec>,
    /// Rows of response tables.
    pub responses: Vec<ResponseSpec>,
    /// JSON code blocks.
    pub examples: Vec<JsonExample>,
    /// Secondary structure tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structures: Vec<StructureTable>,
    /// Items needing manual review.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_flags: Vec<ReviewFlag>,
}

impl ParsedDoc {
    /// First request example with valid JSON.
    pub fn request_example(&self) -> Option<&JsonValue> {
        self.examples
            .iter()
            .filter(|e| e.role == ExampleRole::Request)
            .find_map(JsonExample::json)
    }

    /// First non-error response example with valid JSON.
    pub fn success_example(&self) -> Option<&JsonValue> {
        self.examples
            .iter()
            .filter(|e| e.role == ExampleRole::Response && !e.is_error())
            .find_map(JsonExample::json)
    }

    /// Error response examples with valid JSON, in document order.
    pub fn error_examples(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.examples
            .iter()
            .filter(|e| e.role == ExampleRole::Response && e.is_error())
            .filter_map(|e| e.json().map(|v| (e.status_label.as_str(), v)))
    }

    /// Looks up a parameter by path.
    pub fn parameter(&self, path: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.path == path)
    }

    /// Direct children of a parameter path.
    pub fn children_of<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ParamSpec> {
        self.parameters
            .iter()
            .filter(move |p| p.parent_path() == Some(path))
    }
}
