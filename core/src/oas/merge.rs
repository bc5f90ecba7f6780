#![deny(missing_docs)]

//! # Path File Merge
//!
//! Folds a freshly emitted operation into the content of an existing path
//! file. Keys derived from the docs are replaced; everything else already in
//! the file (hand-written keys, request bodies, responses, other methods and
//! paths) is kept as is.

use crate::oas::models::{OpenApiPathItem, MDX_DOC_PATH_KEY, REVIEW_FLAGS_KEY};
use serde_json::{Map, Value as JsonValue};

/// Operation keys that are always regenerated from the MDX page.
pub const DERIVABLE_KEYS: &[&str] = &[
    "operationId",
    "summary",
    "description",
    MDX_DOC_PATH_KEY,
    REVIEW_FLAGS_KEY,
    "parameters",
];

/// Merges `generated` into `existing` (the parsed content of the target file).
///
/// The existing operation is located by operationId anywhere in the file and
/// moved under the generated path key and method if it lives elsewhere.
pub fn merge_path_item(existing: Option<&JsonValue>, generated: &OpenApiPathItem) -> JsonValue {
    let Some(JsonValue::Object(existing)) = existing else {
        return generated.to_document();
    };
    let mut doc = existing.clone();

    let previous = take_operation(&mut doc, &generated.operation_id);
    let fresh = generated.to_operation();
    let merged = match previous {
        Some(JsonValue::Object(previous)) => merge_operation(previous, &fresh),
        _ => fresh,
    };

    let methods = doc
        .entry(generated.path_key.clone())
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if !methods.is_object() {
        *methods = JsonValue::Object(Map::new());
    }
    if let Some(methods) = methods.as_object_mut() {
        methods.insert(generated.http_method.clone(), merged);
    }
    JsonValue::Object(doc)
}

/// Removes the operation with `operation_id` from the document, dropping a
/// path entry that becomes empty. Returns the removed operation.
fn take_operation(doc: &mut Map<String, JsonValue>, operation_id: &str) -> Option<JsonValue> {
    let mut found: Option<(String, String)> = None;
    'outer: for (path, methods) in doc.iter() {
        let Some(methods) = methods.as_object() else {
            continue;
        };
        for (method, op) in methods {
            if op.get("operationId").and_then(JsonValue::as_str) == Some(operation_id) {
                found = Some((path.clone(), method.clone()));
                break 'outer;
            }
        }
    }

    let (path, method) = found?;
    let methods = doc.get_mut(&path)?.as_object_mut()?;
    let op = methods.shift_remove(&method)?;
    if methods.is_empty() {
        doc.shift_remove(&path);
    }
    Some(op)
}

fn merge_operation(mut previous: Map<String, JsonValue>, fresh: &JsonValue) -> JsonValue {
    let Some(fresh) = fresh.as_object() else {
        return JsonValue::Object(previous);
    };

    for key in DERIVABLE_KEYS {
        match fresh.get(*key) {
            Some(value) => {
                previous.insert((*key).to_string(), value.clone());
            }
            None => {
                previous.shift_remove(*key);
            }
        }
    }
    for (key, value) in fresh {
        if !previous.contains_key(key) {
            previous.insert(key.clone(), value.clone());
        }
    }
    JsonValue::Object(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ApiVersion;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn generated() -> OpenApiPathItem {
        let mut custom_fields = IndexMap::new();
        custom_fields.insert(MDX_DOC_PATH_KEY.to_string(), json!("new/path.mdx"));
        let mut responses = IndexMap::new();
        responses.insert("200".to_string(), json!({"description": "generated"}));
        OpenApiPathItem {
            version: ApiVersion::V1,
            path_key: "/api/v1/m".into(),
            http_method: "post".into(),
            operation_id: "m".into(),
            summary: "New summary".into(),
            description: "New description".into(),
            custom_fields,
            parameters: vec![json!({"name": "coin"})],
            request_body: Some(json!({"content": {}})),
            responses,
        }
    }

    #[test]
    fn test_no_existing_file() {
        assert_eq!(merge_path_item(None, &generated()), generated().to_document());
    }

    #[test]
    fn test_hand_edits_preserved() {
        let existing = json!({
            "/api/v1/m": {
                "post": {
                    "operationId": "m",
                    "summary": "Old",
                    "x-hand-note": {"keep": [1, 2, 3]},
                    "responses": {"200": {"description": "hand written"}},
                    "parameters": [{"name": "stale"}]
                },
                "get": {"operationId": "m_get", "responses": {}}
            },
            "/other": {"post": {"operationId": "other"}}
        });
        let merged = merge_path_item(Some(&existing), &generated());
        let op = &merged["/api/v1/m"]["post"];

        assert_eq!(op["summary"], "New summary");
        assert_eq!(op["parameters"], json!([{"name": "coin"}]));
        assert_eq!(op["x-mdx-doc-path"], "new/path.mdx");
        assert_eq!(op["x-hand-note"], json!({"keep": [1, 2, 3]}));
        assert_eq!(op["responses"]["200"]["description"], "hand written");
        assert_eq!(op["requestBody"], json!({"content": {}}));
        assert!(merged["/api/v1/m"]["get"].is_object());
        assert!(merged["/other"]["post"].is_object());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = json!({"/api/v1/m": {"post": {"operationId": "m", "x-a": 1, "responses": {}}}});
        let once = merge_path_item(Some(&existing), &generated());
        let twice = merge_path_item(Some(&once), &generated());
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_operation_moved_to_new_path_key() {
        let existing = json!({"/legacy/m": {"post": {"operationId": "m", "x-a": true}}});
        let merged = merge_path_item(Some(&existing), &generated());
        assert!(merged.get("/legacy/m").is_none());
        assert_eq!(merged["/api/v1/m"]["post"]["x-a"], true);
    }

    #[test]
    fn test_stale_review_flags_dropped() {
        let existing = json!({"/api/v1/m": {"post": {"operationId": "m", "x-review-flags": ["old"]}}});
        let merged = merge_path_item(Some(&existing), &generated());
        assert!(merged["/api/v1/m"]["post"].get("x-review-flags").is_none());
    }
}
