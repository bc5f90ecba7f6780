#![deny(missing_docs)]

//! # OpenAPI Emitter
//!
//! Builds an [`OpenApiPathItem`] from a registry entry and its parsed page.
//!
//! - Query/path parameters become OpenAPI parameter objects.
//! - Nested parameters fold into their root's object schema.
//! - Body parameters and the request example feed the request body.
//! - Examples seed the `200` and `default` responses.
//!
//! Object shapes are looked up in the component library; anything without a
//! match is inlined with a `TODO` note in its description.

use crate::config::EmitterConfig;
use crate::error::{AppError, AppResult};
use crate::mdx::{ParamLocation, ParamSpec, ParamType, ParsedDoc, ResponseSpec};
use crate::oas::models::{OpenApiPathItem, MDX_DOC_PATH_KEY, REVIEW_FLAGS_KEY, TODO_MARKER};
use crate::registry::MethodEntry;
use crate::schemas::{SchemaMatcher, Shape};
use crate::type_mapping::{infer_schema, param_schema};
use indexmap::IndexMap;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeSet;

/// Description given to inline schemas that have no component match.
pub const INLINE_TODO: &str = "TODO: no matching component schema, verify inline definition";

/// Description of the placeholder `200` response schema.
pub const RESPONSE_TODO: &str = "TODO: Define response structure";

/// Everything `emit` needs besides the entry and the page.
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    /// Component lookup.
    pub matcher: &'a SchemaMatcher<'a>,
    /// Path template and HTTP method.
    pub config: &'a EmitterConfig,
}

/// Emits the path item for one method. Same inputs, same output.
pub fn emit(entry: &MethodEntry, doc: &ParsedDoc, ctx: &EmitContext<'_>) -> AppResult<OpenApiPathItem> {
    let path_key = ctx
        .config
        .path_template
        .replace("{version}", entry.version.as_str())
        .replace("{method}", &entry.method_name);

    let mut custom_fields = IndexMap::new();
    custom_fields.insert(
        MDX_DOC_PATH_KEY.to_string(),
        JsonValue::String(entry.mdx_path.clone()),
    );
    if !doc.review_flags.is_empty() {
        let flags = doc
            .review_flags
            .iter()
            .map(|f| JsonValue::String(f.to_string()))
            .collect();
        custom_fields.insert(REVIEW_FLAGS_KEY.to_string(), JsonValue::Array(flags));
    }

    let parameters = doc
        .parameters
        .iter()
        .filter(|p| p.is_top_level() && p.location.openapi_in().is_some())
        .map(|p| parameter_object(p, doc, ctx.matcher))
        .collect::<AppResult<Vec<_>>>()?;

    let item = OpenApiPathItem {
        version: entry.version,
        path_key,
        http_method: ctx.config.http_method.to_lowercase(),
        operation_id: entry.method_name.clone(),
        summary: doc.title.clone(),
        description: doc.description.clone(),
        custom_fields,
        parameters,
        request_body: request_body(doc, ctx.matcher)?,
        responses: responses(doc, ctx.matcher)?,
    };

    tracing::debug!(
        method = %entry.method_name,
        version = %entry.version,
        parameters = item.parameters.len(),
        responses = item.responses.len(),
        "Emitted path item"
    );
    Ok(item)
}

/// Looks up a component, folding ambiguity into "no match".
fn lookup(matcher: &SchemaMatcher<'_>, shape: &Shape) -> AppResult<Option<String>> {
    match matcher.match_shape(shape) {
        Ok(found) => Ok(found.map(|c| c.source_path.clone())),
        Err(AppError::SchemaMatchAmbiguous { candidates }) => {
            tracing::warn!(candidates = ?candidates, "Ambiguous schema match, inlining");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn with_todo(mut schema: JsonValue) -> JsonValue {
    if let Some(map) = schema.as_object_mut() {
        let description = match map.get("description").and_then(JsonValue::as_str) {
            Some(existing) if existing.contains(TODO_MARKER) => existing.to_string(),
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, INLINE_TODO),
            _ => INLINE_TODO.to_string(),
        };
        map.insert("description".into(), JsonValue::String(description));
    }
    schema
}

fn parameter_object(param: &ParamSpec, doc: &ParsedDoc, matcher: &SchemaMatcher<'_>) -> AppResult<JsonValue> {
    let location = param.location.openapi_in().unwrap_or("query");
    let mut obj = Map::new();
    obj.insert("name".into(), JsonValue::String(param.path.clone()));
    obj.insert("in".into(), JsonValue::String(location.into()));
    obj.insert("description".into(), JsonValue::String(param.description.clone()));
    // path parameters are always required in OpenAPI
    let required = param.required || param.location == ParamLocation::Path;
    obj.insert("required".into(), JsonValue::Bool(required));
    obj.insert("schema".into(), field_schema(param, doc, matcher)?);
    Ok(JsonValue::Object(obj))
}

/// Schema of one parameter. Objects are matched independently of their parent.
fn field_schema(param: &ParamSpec, doc: &ParsedDoc, matcher: &SchemaMatcher<'_>) -> AppResult<JsonValue> {
    if param.kind != ParamType::Object {
        return Ok(param_schema(param.kind, &param.raw_type, param.enum_values.as_ref()));
    }
    let shape = Shape::from_children(&param.path, &doc.parameters);
    if let Some(reference) = lookup(matcher, &shape)? {
        return Ok(json!({ "$ref": reference }));
    }
    Ok(with_todo(object_schema(doc.children_of(&param.path), doc, matcher)?))
}

fn object_schema<'a>(
    fields: impl Iterator<Item = &'a ParamSpec>,
    doc: &ParsedDoc,
    matcher: &SchemaMatcher<'_>,
) -> AppResult<JsonValue> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let mut schema = field_schema(field, doc, matcher)?;
        if !field.description.is_empty() && schema.get("$ref").is_none() {
            if let Some(map) = schema.as_object_mut() {
                map.entry("description")
                    .or_insert_with(|| JsonValue::String(field.description.clone()));
            }
        }
        if field.required {
            required.push(JsonValue::String(field.leaf_name().to_string()));
        }
        properties.insert(field.leaf_name().to_string(), schema);
    }
    let mut schema = Map::new();
    schema.insert("type".into(), JsonValue::String("object".into()));
    if !properties.is_empty() {
        schema.insert("properties".into(), JsonValue::Object(properties));
    }
    if !required.is_empty() {
        schema.insert("required".into(), JsonValue::Array(required));
    }
    Ok(JsonValue::Object(schema))
}

fn request_body(doc: &ParsedDoc, matcher: &SchemaMatcher<'_>) -> AppResult<Option<JsonValue>> {
    let body_params: Vec<&ParamSpec> = doc
        .parameters
        .iter()
        .filter(|p| p.location == ParamLocation::Body)
        .collect();
    let example = doc.request_example();
    if body_params.is_empty() && example.is_none() {
        return Ok(None);
    }

    let shape = if body_params.is_empty() {
        example.map(Shape::from_json).unwrap_or_default()
    } else {
        Shape::from_params(body_params.iter().copied())
    };

    let schema = match lookup(matcher, &shape)? {
        Some(reference) => json!({ "$ref": reference }),
        None if !body_params.is_empty() => with_todo(object_schema(
            body_params.iter().copied().filter(|p| p.is_top_level()),
            doc,
            matcher,
        )?),
        None => with_todo(example.map(infer_schema).unwrap_or_else(|| json!({"type": "object"}))),
    };

    let mut media = Map::new();
    media.insert("schema".into(), schema);
    if let Some(example) = example {
        media.insert("example".into(), example.clone());
    }
    Ok(Some(json!({
        "required": true,
        "content": { "application/json": JsonValue::Object(media) }
    })))
}

fn responses(doc: &ParsedDoc, matcher: &SchemaMatcher<'_>) -> AppResult<IndexMap<String, JsonValue>> {
    let mut responses = IndexMap::new();

    let success_schema = match doc.success_example() {
        Some(example) => Some(success_schema_from_example(example, matcher)?),
        None if !doc.responses.is_empty() => Some(with_todo(response_table_schema(&doc.responses))),
        None => None,
    };
    let mut media = Map::new();
    media.insert(
        "schema".into(),
        success_schema.unwrap_or_else(|| {
            json!({
                "type": "object",
                "properties": {"result": {"type": "object", "description": RESPONSE_TODO}}
            })
        }),
    );
    if let Some(example) = doc.success_example() {
        media.insert("example".into(), example.clone());
    }
    responses.insert(
        "200".to_string(),
        json!({
            "description": "Successful response",
            "content": { "application/json": JsonValue::Object(media) }
        }),
    );

    let errors: Vec<(&str, &JsonValue)> = doc.error_examples().collect();
    if let Some((_, first)) = errors.first() {
        let mut examples = Map::new();
        let mut used = BTreeSet::new();
        for (label, value) in &errors {
            let name = unique_example_name(label, &mut used);
            examples.insert(
                name,
                json!({ "summary": label, "value": value }),
            );
        }
        responses.insert(
            "default".to_string(),
            json!({
                "description": "Error response",
                "content": {
                    "application/json": {
                        "schema": infer_schema(first),
                        "examples": JsonValue::Object(examples)
                    }
                }
            }),
        );
    }
    Ok(responses)
}

fn success_schema_from_example(example: &JsonValue, matcher: &SchemaMatcher<'_>) -> AppResult<JsonValue> {
    if let Some(result) = example.get("result").filter(|r| r.is_object()) {
        if let Some(reference) = lookup(matcher, &Shape::from_json(result))? {
            let mut schema = infer_schema(example);
            if let Some(props) = schema.get_mut("properties").and_then(JsonValue::as_object_mut) {
                props.insert("result".into(), json!({ "$ref": reference }));
            }
            return Ok(schema);
        }
    }
    Ok(with_todo(infer_schema(example)))
}

/// Nested object schema built from dotted response table paths.
fn response_table_schema(rows: &[ResponseSpec]) -> JsonValue {
    let mut root = json!({"type": "object", "properties": {}});
    for row in rows {
        let mut cursor = &mut root;
        let segments: Vec<&str> = row.path.split('.').collect();
        for (idx, segment) in segments.iter().enumerate() {
            let leaf = idx + 1 == segments.len();
            let Some(props) = ensure_properties(cursor) else {
                break;
            };
            let next = props.entry(segment.to_string()).or_insert_with(|| {
                if leaf {
                    let mut s = param_schema(row.kind, &row.raw_type, None);
                    if !row.description.is_empty() {
                        s["description"] = JsonValue::String(row.description.clone());
                    }
                    s
                } else {
                    json!({"type": "object", "properties": {}})
                }
            });
            cursor = next;
        }
    }
    root
}

fn ensure_properties(schema: &mut JsonValue) -> Option<&mut Map<String, JsonValue>> {
    let map = schema.as_object_mut()?;
    if map.get("type").and_then(JsonValue::as_str) != Some("object") {
        return None;
    }
    map.entry("properties")
        .or_insert_with(|| JsonValue::Object(Map::new()))
        .as_object_mut()
}

fn unique_example_name(label: &str, used: &mut BTreeSet<String>) -> String {
    let base = label
        .strip_prefix("error:")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(label);
    let base: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let mut name = base.clone();
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdx::{ExampleBody, ExampleRole, JsonExample, ReviewFlag, ReviewKind};
    use crate::registry::ApiVersion;
    use crate::schemas::library::{fingerprint, ComponentLibrary, ComponentRef};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn param(path: &str, kind: ParamType, required: bool) -> ParamSpec {
        ParamSpec {
            path: path.into(),
            kind,
            raw_type: kind.to_string(),
            required,
            description: format!("{} field", path),
            location: ParamLocation::Query,
            enum_values: None,
            synthesized: false,
        }
    }

    fn doc() -> ParsedDoc {
        ParsedDoc {
            title: "Validate Address".into(),
            description: "Checks an address".into(),
            parameters: vec![
                param("coin", ParamType::String, true),
                param("address", ParamType::String, true),
            ],
            examples: vec![
                JsonExample {
                    role: ExampleRole::Request,
                    status_label: "success".into(),
                    body: ExampleBody::Json(json!({
                        "userpass": "x", "method": "validateaddress", "coin": "DOC", "address": "R1"
                    })),
                },
                JsonExample {
                    role: ExampleRole::Response,
                    status_label: "success".into(),
                    body: ExampleBody::Json(json!({"result": {"is_valid": true}})),
                },
                JsonExample {
                    role: ExampleRole::Response,
                    status_label: "error: NoSuchCoin".into(),
                    body: ExampleBody::Json(json!({"error": "no such coin", "error_type": "NoSuchCoin"})),
                },
            ],
            ..Default::default()
        }
    }

    fn component(name: &str, fields: &[&str]) -> ComponentRef {
        let fields: BTreeMap<String, String> = fields
            .iter()
            .map(|f| (f.to_string(), "string".to_string()))
            .collect();
        ComponentRef {
            name: name.into(),
            source_path: format!("../../components/schemas/Common.yaml#/{}", name),
            shape_fingerprint: fingerprint(&fields),
            fields,
            file: "Common.yaml".into(),
        }
    }

    fn entry() -> MethodEntry {
        MethodEntry::new("validateaddress", ApiVersion::V1, "docs/validateaddress/index.mdx")
    }

    #[test]
    fn test_emit_parameters_and_metadata() {
        let lib = ComponentLibrary::default();
        let matcher = SchemaMatcher::new(&lib, 0.8);
        let config = EmitterConfig::default();
        let ctx = EmitContext { matcher: &matcher, config: &config };

        let item = emit(&entry(), &doc(), &ctx).unwrap();
        assert_eq!(item.path_key, "/api/v1/validateaddress");
        assert_eq!(item.http_method, "post");
        assert_eq!(item.operation_id, "validateaddress");
        assert_eq!(item.mdx_doc_path(), Some("docs/validateaddress/index.mdx"));
        assert_eq!(item.parameters.len(), 2);
        for p in &item.parameters {
            assert_eq!(p["required"], true);
            assert_eq!(p["schema"]["type"], "string");
            assert_eq!(p["in"], "query");
        }
        let default = &item.responses["default"];
        assert!(default["content"]["application/json"]["examples"]["NoSuchCoin"].is_object());
    }

    #[test]
    fn test_request_body_ref_when_matched() {
        let lib = ComponentLibrary::new(vec![component("AddressRequest", &["coin", "address"])]);
        let matcher = SchemaMatcher::new(&lib, 0.8);
        let config = EmitterConfig::default();
        let ctx = EmitContext { matcher: &matcher, config: &config };

        let item = emit(&entry(), &doc(), &ctx).unwrap();
        let schema = &item.request_body.as_ref().unwrap()["content"]["application/json"]["schema"];
        assert_eq!(
            schema,
            &json!({"$ref": "../../components/schemas/Common.yaml#/AddressRequest"})
        );
    }

    #[test]
    fn test_request_body_inline_todo_when_unmatched() {
        let lib = ComponentLibrary::new(vec![component("Unrelated", &["x", "y"])]);
        let matcher = SchemaMatcher::new(&lib, 0.8);
        let config = EmitterConfig::default();
        let ctx = EmitContext { matcher: &matcher, config: &config };

        let item = emit(&entry(), &doc(), &ctx).unwrap();
        let schema = &item.request_body.as_ref().unwrap()["content"]["application/json"]["schema"];
        assert_eq!(schema["type"], "object");
        assert!(schema["description"].as_str().unwrap().contains(TODO_MARKER));
        assert!(schema.get("$ref").is_none());
    }

    #[test]
    fn test_nested_params_fold_into_parent() {
        let lib = ComponentLibrary::default();
        let matcher = SchemaMatcher::new(&lib, 0.8);
        let config = EmitterConfig::default();
        let ctx = EmitContext { matcher: &matcher, config: &config };

        let mut d = doc();
        d.parameters = vec![
            ParamSpec {
                synthesized: true,
                ..param("cancel_by", ParamType::Object, true)
            },
            param("cancel_by.type", ParamType::String, true),
            param("cancel_by.data", ParamType::Object, false),
            param("cancel_by.data.base", ParamType::String, true),
        ];
        let item = emit(&entry(), &d, &ctx).unwrap();
        assert_eq!(item.parameters.len(), 1);
        let schema = &item.parameters[0]["schema"];
        assert_eq!(schema["properties"]["type"]["type"], "string");
        assert_eq!(schema["properties"]["data"]["properties"]["base"]["type"], "string");
        assert_eq!(schema["required"], json!(["type"]));
        assert!(schema["description"].as_str().unwrap().starts_with("TODO"));
    }

    #[test]
    fn test_review_flags_and_placeholder_response() {
        let lib = ComponentLibrary::default();
        let matcher = SchemaMatcher::new(&lib, 0.8);
        let config = EmitterConfig::default();
        let ctx = EmitContext { matcher: &matcher, config: &config };

        let d = ParsedDoc {
            title: "T".into(),
            review_flags: vec![ReviewFlag {
                kind: ReviewKind::AmbiguousRequired,
                detail: "limit".into(),
            }],
            ..Default::default()
        };
        let item = emit(&entry(), &d, &ctx).unwrap();
        assert_eq!(
            item.custom_fields[REVIEW_FLAGS_KEY],
            json!(["ambiguous_required: limit"])
        );
        assert!(item.request_body.is_none());
        assert_eq!(
            item.responses["200"]["content"]["application/json"]["schema"]["properties"]["result"]["description"],
            RESPONSE_TODO
        );
    }

    #[test]
    fn test_emit_is_deterministic() {
        let lib = ComponentLibrary::default();
        let matcher = SchemaMatcher::new(&lib, 0.8);
        let config = EmitterConfig::default();
        let ctx = EmitContext { matcher: &matcher, config: &config };
        let a = emit(&entry(), &doc(), &ctx).unwrap().to_document();
        let b = emit(&entry(), &doc(), &ctx).unwrap().to_document();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_unique_example_names() {
        let mut used = BTreeSet::new();
        assert_eq!(unique_example_name("error: NoSuchCoin", &mut used), "NoSuchCoin");
        assert_eq!(unique_example_name("error: NoSuchCoin", &mut used), "NoSuchCoin_2");
        assert_eq!(unique_example_name("error", &mut used), "error");
    }
}
