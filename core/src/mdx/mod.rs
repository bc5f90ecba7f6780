#![deny(missing_docs)]

//! # MDX Document Parser
//!
//! Turns one method page into a [`ParsedDoc`]:
//!
//! - `export const title` / `description` statements,
//! - the argument table (first field table not under a response heading),
//! - response tables and secondary structure tables,
//! - fenced JSON examples, classified as requests or responses.
//!
//! Anything else, including custom JSX components, is kept as narrative.

mod blocks;
mod json;
mod models;
mod tables;

pub use models::*;

use crate::config::ParserConfig;
use crate::error::{AppError, AppResult};
use crate::type_mapping::{DocTypeMapper, TypeMapper};
use blocks::Block;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::OnceLock;
use tables::RawRow;

/// Parses an MDX page with default heuristics.
pub fn parse(text: &str) -> AppResult<ParsedDoc> {
    parse_with(text, &ParserConfig::default(), &DocTypeMapper)
}

/// Parses an MDX page.
///
/// Fails with `MalformedDocument` when the title export or every example
/// code block is missing; the error carries what could still be extracted.
pub fn parse_with(text: &str, config: &ParserConfig, mapper: &dyn TypeMapper) -> AppResult<ParsedDoc> {
    let mut doc = ParsedDoc::default();
    let mut title = None;
    let mut description = None;
    let mut seen_argument_table = false;

    for block in blocks::scan_blocks(text) {
        match block {
            Block::Export { name, value } => match name.as_str() {
                "title" => title = Some(value),
                "description" => description = Some(value),
                _ => {}
            },
            Block::Heading { level, text } => {
                if doc.heading.is_none() && level <= 2 {
                    doc.heading = Some(text);
                }
            }
            Block::Text(text) => doc.narrative_blocks.push(text),
            Block::Table { lines, context } => {
                let Some(rows) = tables::read_table(&lines, config) else {
                    doc.narrative_blocks.push(lines.join("\n"));
                    continue;
                };
                if mentions(&context, "response") {
                    for row in &rows {
                        flag_multi_word(row, &mut doc.review_flags);
                        doc.responses.push(response_spec(row, mapper));
                    }
                } else if !seen_argument_table {
                    seen_argument_table = true;
                    doc.parameters = build_parameters(&rows, config, mapper, &mut doc.review_flags);
                } else {
                    doc.structures.push(StructureTable {
                        heading: context.last().cloned().unwrap_or_default(),
                        fields: rows
                            .iter()
                            .map(|row| param_spec(row, config, mapper).0)
                            .collect(),
                    });
                }
            }
            Block::Code { lang, body, context } => {
                if !is_json_block(&lang, &body) {
                    doc.narrative_blocks.push(format!("```{}\n{}\n```", lang, body));
                    continue;
                }
                doc.examples.push(read_example(&body, &context, &mut doc.review_flags));
            }
        }
    }

    doc.title = title.clone().or_else(|| doc.heading.clone()).unwrap_or_default();
    doc.description = description.unwrap_or_else(|| first_paragraph(&doc.narrative_blocks));

    let mut missing = Vec::new();
    if title.is_none() {
        missing.push("title export");
    }
    if doc.examples.is_empty() {
        missing.push("example code block");
    }

    tracing::debug!(
        title = %doc.title,
        parameters = doc.parameters.len(),
        responses = doc.responses.len(),
        examples = doc.examples.len(),
        flags = doc.review_flags.len(),
        "Parsed MDX document"
    );

    if !missing.is_empty() {
        let missing = missing.join(", ");
        doc.review_flags.push(ReviewFlag {
            kind: ReviewKind::MissingMarker,
            detail: missing.clone(),
        });
        return Err(AppError::MalformedDocument {
            missing,
            partial: Box::new(doc),
        });
    }

    Ok(doc)
}

fn mentions(context: &[String], needle: &str) -> bool {
    context.iter().any(|c| c.to_lowercase().contains(needle))
}

fn param_spec(row: &RawRow, config: &ParserConfig, mapper: &dyn TypeMapper) -> (ParamSpec, bool) {
    let decision = tables::decide_required(row, config);
    let mapped = mapper.map(&row.raw_type, &row.description);
    let spec = ParamSpec {
        path: field_path(&row.name),
        kind: mapped.kind,
        raw_type: row.raw_type.clone(),
        required: decision.required,
        description: row.description.clone(),
        location: config.default_location,
        enum_values: mapped.enum_values,
        synthesized: false,
    };
    (spec, decision.ambiguous)
}

/// Field path of a name cell; words of a multi-word cell are joined with `_`.
fn field_path(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

fn flag_multi_word(row: &RawRow, flags: &mut Vec<ReviewFlag>) {
    if row.name.split_whitespace().nth(1).is_some() {
        flags.push(ReviewFlag {
            kind: ReviewKind::MultiWordName,
            detail: row.name.trim().to_string(),
        });
    }
}

fn response_spec(row: &RawRow, mapper: &dyn TypeMapper) -> ResponseSpec {
    let mapped = mapper.map(&row.raw_type, &row.description);
    ResponseSpec {
        path: field_path(&row.name),
        kind: mapped.kind,
        raw_type: row.raw_type.clone(),
        description: row.description.clone(),
    }
}

/// Converts argument rows, dropping duplicates and synthesizing missing parents.
fn build_parameters(
    rows: &[RawRow],
    config: &ParserConfig,
    mapper: &dyn TypeMapper,
    flags: &mut Vec<ReviewFlag>,
) -> Vec<ParamSpec> {
    let mut explicit: Vec<ParamSpec> = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();

    for row in rows {
        flag_multi_word(row, flags);
        let (spec, ambiguous) = param_spec(row, config, mapper);
        if !seen.insert(spec.path.clone()) {
            flags.push(ReviewFlag {
                kind: ReviewKind::DuplicateParameter,
                detail: spec.path,
            });
            continue;
        }
        if ambiguous {
            flags.push(ReviewFlag {
                kind: ReviewKind::AmbiguousRequired,
                detail: spec.path.clone(),
            });
        }
        explicit.push(spec);
    }

    let mut params = Vec::with_capacity(explicit.len());
    for spec in explicit {
        let segments: Vec<&str> = spec.path.split('.').collect();
        for depth in 1..segments.len() {
            let parent = segments[..depth].join(".");
            if seen.insert(parent.clone()) {
                params.push(ParamSpec {
                    path: parent,
                    kind: ParamType::Object,
                    raw_type: "object".into(),
                    required: spec.required,
                    description: String::new(),
                    location: spec.location,
                    enum_values: None,
                    synthesized: true,
                });
            }
        }
        params.push(spec);
    }
    params
}

fn is_json_block(lang: &str, body: &str) -> bool {
    match lang {
        "json" | "json5" | "jsonc" => true,
        "" => {
            let start = body.trim_start();
            start.starts_with('{') || start.starts_with('[')
        }
        _ => false,
    }
}

fn paren_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").expect("static regex"))
}

fn read_example(body: &str, context: &[String], flags: &mut Vec<ReviewFlag>) -> JsonExample {
    let parsed = match json::parse_example(body) {
        Ok(value) => ExampleBody::Json(value),
        Err(e) => {
            flags.push(ReviewFlag {
                kind: ReviewKind::InvalidJson,
                detail: format!("{}: {}", context.last().map(String::as_str).unwrap_or("example"), e),
            });
            ExampleBody::Raw(body.to_string())
        }
    };
    let value = match &parsed {
        ExampleBody::Json(v) => Some(v),
        ExampleBody::Raw(_) => None,
    };
    let role = example_role(context, value);
    JsonExample {
        role,
        status_label: status_label(context, value),
        body: parsed,
    }
}

fn example_role(context: &[String], value: Option<&JsonValue>) -> ExampleRole {
    if mentions(context, "response") {
        return ExampleRole::Response;
    }
    if mentions(context, "request") {
        return ExampleRole::Request;
    }
    match value.and_then(JsonValue::as_object) {
        Some(obj) if obj.contains_key("method") => ExampleRole::Request,
        Some(obj) if obj.contains_key("result") || obj.contains_key("error") => ExampleRole::Response,
        _ => ExampleRole::Request,
    }
}

fn status_label(context: &[String], value: Option<&JsonValue>) -> String {
    let error_type = value
        .and_then(|v| v.get("error_type"))
        .and_then(JsonValue::as_str);

    let from_heading = context
        .iter()
        .rev()
        .find_map(|c| paren_regex().captures(c).map(|caps| caps[1].trim().to_string()));

    if let Some(label) = from_heading {
        if label.to_lowercase().starts_with("error") {
            let rest = &label["error".len()..];
            return match error_type {
                Some(t) if !rest.contains(':') => format!("error: {}", t),
                _ => format!("error{}", rest),
            };
        }
        return label;
    }

    let has_error = value
        .and_then(JsonValue::as_object)
        .is_some_and(|obj| obj.contains_key("error"));
    match (has_error, error_type) {
        (true, Some(t)) => format!("error: {}", t),
        (true, None) => "error".into(),
        _ => "success".into(),
    }
}

/// First prose paragraph, with inline markup removed.
fn first_paragraph(narrative: &[String]) -> String {
    narrative
        .iter()
        .filter(|b| !b.starts_with('<') && !b.starts_with("```") && !b.starts_with("export"))
        .map(|b| tables::clean_description(b))
        .find(|b| !b.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALIDATE_ADDRESS: &str = r#"export const title = "Komodo DeFi Framework Method: Validate Address";
export const description = "The validateaddress method checks if an input string is a valid address of the specified coin.";

# validateaddress

The `validateaddress` method checks if an input string is a valid address of the specified coin.

## Arguments

| Parameter | Type   | Description                             |
| --------- | ------ | --------------------------------------- |
| coin      | string | The coin to validate address for        |
| address   | string | The input string to validate            |

<CodeGroup title="Request">
  ```json
  {
    "userpass": "RPC_UserP@SSW0RD",
    "method": "validateaddress",
    "coin": "DOC",
    "address": "RRnMcSeKiLrNdbp91qNVQwwXx5azD4S4CD",
  }
  ```
</CodeGroup>

## Response

| Structure | Type   | Description                           |
| --------- | ------ | ------------------------------------- |
| result.is_valid | bool | Whether input string is a valid address |
| result.reason | string | Optional. Reason why the address is invalid |

#### Response (success)

```json
{"result": {"is_valid": true}}
```

#### Response (error)

```json
{"error": "rpc:123] No such coin", "error_type": "NoSuchCoin"}
```
"#;

    #[test]
    fn test_validateaddress() {
        let doc = parse(VALIDATE_ADDRESS).unwrap();
        assert_eq!(doc.title, "Komodo DeFi Framework Method: Validate Address");
        assert!(doc.description.starts_with("The validateaddress method"));
        assert_eq!(doc.heading.as_deref(), Some("validateaddress"));

        let paths: Vec<&str> = doc.parameters.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["coin", "address"]);
        assert!(doc.parameters.iter().all(|p| p.required && p.kind == ParamType::String));

        assert_eq!(doc.responses.len(), 2);
        assert_eq!(doc.responses[0].kind, ParamType::Bool);

        assert_eq!(doc.examples.len(), 3);
        assert_eq!(doc.examples[0].role, ExampleRole::Request);
        assert_eq!(doc.request_example().unwrap()["method"], "validateaddress");
        assert_eq!(doc.examples[1].status_label, "success");
        assert_eq!(doc.examples[2].status_label, "error: NoSuchCoin");
        assert!(doc.review_flags.is_empty());
    }

    #[test]
    fn test_missing_title_is_malformed_with_partial() {
        let text = "# method\n\n| Parameter | Type | Description |\n|---|---|---|\n| a | string | x |\n\n```json\n{}\n```\n";
        match parse(text) {
            Err(AppError::MalformedDocument { missing, partial }) => {
                assert_eq!(missing, "title export");
                assert_eq!(partial.title, "method");
                assert_eq!(partial.parameters.len(), 1);
                assert_eq!(partial.review_flags.last().unwrap().kind, ReviewKind::MissingMarker);
            }
            other => panic!("expected MalformedDocument, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_examples_is_malformed() {
        let err = parse("export const title = \"T\";\n\nJust prose.\n").unwrap_err();
        assert!(matches!(err, AppError::MalformedDocument { ref missing, .. } if missing == "example code block"));
    }

    #[test]
    fn test_invalid_json_kept_raw_and_flagged() {
        let text = "export const title = \"T\";\n\n```json\n{ \"method\": \n```\n";
        let doc = parse(text).unwrap();
        assert!(matches!(doc.examples[0].body, ExampleBody::Raw(_)));
        assert_eq!(doc.review_flags[0].kind, ReviewKind::InvalidJson);
    }

    #[test]
    fn test_nested_parents_synthesized_and_duplicates_flagged() {
        let text = r#"export const title = "T";

| Parameter | Type | Description |
|---|---|---|
| cancel_by.type | string | Either `All` or `Pair` |
| cancel_by.data.base | string | Base ticker |
| cancel_by.type | string | again |
| limit | integer | Optional, defaults to `10` |

```json
{"method": "cancel_all_orders"}
```
"#;
        let doc = parse(text).unwrap();
        let paths: Vec<&str> = doc.parameters.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["cancel_by", "cancel_by.type", "cancel_by.data", "cancel_by.data.base", "limit"]
        );
        assert!(doc.parameters[0].synthesized);
        assert_eq!(doc.parameters[0].kind, ParamType::Object);
        assert_eq!(doc.parameters[1].kind, ParamType::Enum);
        assert!(!doc.parameters[4].required);
        assert_eq!(doc.review_flags.len(), 1);
        assert_eq!(doc.review_flags[0].kind, ReviewKind::DuplicateParameter);
    }

    #[test]
    fn test_multi_word_name_is_flagged() {
        let text = r#"export const title = "T";

| Parameter | Type | Description |
|---|---|---|
| coin name | string | Ticker |
| amount | string | Amount |

```json
{"method": "withdraw"}
```
"#;
        let doc = parse(text).unwrap();
        let paths: Vec<&str> = doc.parameters.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["coin_name", "amount"]);
        assert_eq!(
            doc.review_flags,
            vec![ReviewFlag {
                kind: ReviewKind::MultiWordName,
                detail: "coin name".into(),
            }]
        );
    }

    #[test]
    fn test_second_table_is_structure_and_unknown_markup_is_narrative() {
        let text = r#"export const title = "T";

<Note>
  Something custom
</Note>

## Arguments

| Param | Type | Description |
|---|---|---|
| params | ActivationParams | See below |

### ActivationParams

| Field | Type | Description |
|---|---|---|
| mode | object | Activation mode |

```json
{"method": "enable"}
```
"#;
        let doc = parse(text).unwrap();
        assert_eq!(doc.parameters.len(), 1);
        assert_eq!(doc.structures.len(), 1);
        assert_eq!(doc.structures[0].heading, "ActivationParams");
        assert!(doc.narrative_blocks.iter().any(|b| b.contains("<Note>")));
        // description falls back to the first prose paragraph, skipping JSX
        assert_eq!(doc.description, "");
    }

    #[test]
    fn test_required_column_and_custom_keywords() {
        let config = ParserConfig {
            optional_keywords: vec!["may be omitted".into()],
            ..ParserConfig::default()
        };
        let text = r#"export const title = "T";

| Parameter | Type | Required | Description |
|---|---|---|---|
| a | string | ✓ | Optional thing |
| b | string |   | May be omitted |

```json
{}
```
"#;
        let doc = parse_with(text, &config, &DocTypeMapper).unwrap();
        assert!(doc.parameters[0].required);
        assert!(!doc.parameters[1].required);
        // empty override cell falls back to the heuristic and is flagged
        assert_eq!(doc.review_flags.len(), 1);
        assert_eq!(doc.review_flags[0].detail, "b");
    }
}
