#![deny(missing_docs)]

//! # Path File I/O
//!
//! Rendering path documents to YAML and reading existing ones back for merge.

use crate::error::{AppError, AppResult};
use crate::registry::ApiVersion;
use serde_json::Value as JsonValue;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// First line of every generated path file.
pub fn file_header(method_name: &str, version: ApiVersion) -> String {
    format!("# OpenAPI path spec for {} ({})\n", method_name, version)
}

/// Renders a path document as YAML, prefixed with the header comment.
pub fn render_yaml(doc: &JsonValue, method_name: &str, version: ApiVersion) -> AppResult<String> {
    let body = serde_yaml::to_string(doc)
        .map_err(|e| AppError::General(format!("Failed to render YAML for {}: {}", method_name, e)))?;
    Ok(format!("{}{}", file_header(method_name, version), body))
}

/// Parses a path document from YAML. Empty input yields `None`.
pub fn parse_yaml(text: &str) -> AppResult<Option<JsonValue>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: JsonValue = serde_yaml::from_str(text)
        .map_err(|e| AppError::General(format!("Failed to parse path file YAML: {}", e)))?;
    Ok(match value {
        JsonValue::Null => None,
        other => Some(other),
    })
}

/// A path file as found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingFile {
    /// Exact file contents, comments and formatting included.
    pub text: String,
    /// Parsed document.
    pub doc: JsonValue,
}

/// Reads an existing path file keeping its text, `None` when it does not
/// exist or holds no document.
pub fn read_existing_file(path: &Path) -> AppResult<Option<ExistingFile>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Io(e)),
    };
    let doc = parse_yaml(&text).map_err(|e| AppError::General(format!("{:?}: {}", path, e)))?;
    Ok(doc.map(|doc| ExistingFile { text, doc }))
}

/// Reads an existing path file, `None` when it does not exist.
pub fn read_existing(path: &Path) -> AppResult<Option<JsonValue>> {
    Ok(read_existing_file(path)?.map(|file| file.doc))
}
