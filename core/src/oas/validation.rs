#![deny(missing_docs)]

//! # OpenAPI Validation
//!
//! Just enough checking to catch malformed output before it is written:
//!
//! - a freshly emitted document has exactly one path key,
//! - the operation's `operationId` equals the method name,
//! - `responses` is a non-empty mapping,
//! - every `$ref` resolves in the component library, or sits inside a
//!   schema already marked `TODO`.
//!
//! Structural problems are errors. Unresolved references are returned so the
//! caller can flag them on the operation.

use crate::error::{AppError, AppResult};
use crate::oas::models::{OpenApiPathItem, TODO_MARKER};
use crate::oas::ref_utils::{parse_reference, ReferenceKind};
use crate::schemas::ComponentLibrary;
use serde_json::Value as JsonValue;

/// Validates a freshly emitted item.
pub fn validate_path_item(item: &OpenApiPathItem, method_name: &str) -> AppResult<()> {
    let doc = item.to_document();
    let paths = doc.as_object().map(|m| m.len()).unwrap_or(0);
    if paths != 1 {
        return Err(AppError::InvalidOutput(format!(
            "expected a single path key for '{}', found {}",
            method_name, paths
        )));
    }
    validate_operation(&item.to_operation(), method_name)
}

/// Validates one operation object.
pub fn validate_operation(op: &JsonValue, method_name: &str) -> AppResult<()> {
    let operation_id = op.get("operationId").and_then(JsonValue::as_str);
    if operation_id != Some(method_name) {
        return Err(AppError::InvalidOutput(format!(
            "operationId {:?} does not match method name '{}'",
            operation_id, method_name
        )));
    }
    let has_responses = op
        .get("responses")
        .and_then(JsonValue::as_object)
        .is_some_and(|r| !r.is_empty());
    if !has_responses {
        return Err(AppError::InvalidOutput(format!(
            "operation '{}' has no responses",
            method_name
        )));
    }
    Ok(())
}

/// Validates the operation for `item` inside a merged path document and
/// returns the `$ref`s that neither resolve nor carry a `TODO` marker.
pub fn validate_merged(
    doc: &JsonValue,
    item: &OpenApiPathItem,
    library: &ComponentLibrary,
) -> AppResult<Vec<String>> {
    let op = doc
        .get(&item.path_key)
        .and_then(|methods| methods.get(&item.http_method))
        .ok_or_else(|| {
            AppError::InvalidOutput(format!(
                "merged document lacks {} {}",
                item.http_method, item.path_key
            ))
        })?;
    validate_operation(op, &item.operation_id)?;

    let mut unresolved = Vec::new();
    collect_unresolved(op, library, false, &mut unresolved);
    Ok(unresolved)
}

fn collect_unresolved(value: &JsonValue, library: &ComponentLibrary, flagged: bool, out: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => {
            let flagged = flagged
                || map
                    .get("description")
                    .and_then(JsonValue::as_str)
                    .is_some_and(|d| d.contains(TODO_MARKER));
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", JsonValue::String(reference)) => {
                        if !flagged && !ref_resolves(reference, library) {
                            out.push(reference.clone());
                        }
                    }
                    // examples are free-form data, not schemas
                    ("example" | "examples", _) => {}
                    _ => collect_unresolved(child, library, flagged, out),
                }
            }
        }
        JsonValue::Array(items) => items
            .iter()
            .for_each(|i| collect_unresolved(i, library, flagged, out)),
        _ => {}
    }
}

fn ref_resolves(reference: &str, library: &ComponentLibrary) -> bool {
    match parse_reference(reference).kind {
        ReferenceKind::Remote => false,
        // in-file pointers (e.g. #/components/...) cannot be checked from a path fragment
        ReferenceKind::Local => true,
        ReferenceKind::Relative => library.resolve_ref(reference).is_some(),
    }
}
