//! # Collection Builder
//!
//! Folds emitted path items into a Postman collection: one folder per API
//! version, category sub-folders inside, requests sorted by operationId.
//! Ids are derived from content so rebuilding an unchanged set of path items
//! yields byte-identical output.

use super::models::*;
use crate::error::{AppError, AppResult};
use crate::oas::OpenApiPathItem;
use crate::registry::ApiVersion;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// Default KDF RPC endpoint.
pub const DEFAULT_KDF_URL: &str = "http://127.0.0.1:7783";
/// Default RPC password placeholder.
pub const DEFAULT_USERPASS: &str = "RPC_UserP@SSW0RD";

const USERPASS_VAR: &str = "{{userpass}}";
const KDF_URL_VAR: &str = "{{kdf_url}}";

/// Request folder inside a version folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    /// Coin and token activation.
    Activation,
    /// Lightning network.
    Lightning,
    /// Orders and swaps.
    Trading,
    /// Balances, withdrawals and history.
    Wallet,
    /// Event streaming.
    Streaming,
    /// Task-managed operations.
    Tasks,
    /// Everything else.
    Utility,
}

impl Category {
    /// Categories in the order they are tried.
    pub const ALL: [Category; 7] = [
        Category::Activation,
        Category::Lightning,
        Category::Trading,
        Category::Wallet,
        Category::Streaming,
        Category::Tasks,
        Category::Utility,
    ];

    /// Folder name.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Category::Activation => "Coin & Token Activation",
            Category::Lightning => "Lightning Network",
            Category::Trading => "Trading & Orders",
            Category::Wallet => "Wallet Management",
            Category::Streaming => "Real-time Streaming",
            Category::Tasks => "Task Management",
            Category::Utility => "Utility & Information",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Category::Activation => &["enable", "activation", "task::enable"],
            Category::Lightning => &["lightning::", "task::enable_lightning"],
            Category::Trading => &[
                "buy",
                "sell",
                "setprice",
                "cancel_order",
                "orderbook",
                "trade",
                "swap",
                "best_orders",
            ],
            Category::Wallet => &["balance", "withdraw", "my_tx_history", "get_wallet", "get_public_key"],
            Category::Streaming => &["stream::"],
            Category::Tasks => &["task::", "init", "status", "cancel", "user_action"],
            Category::Utility => &["version", "metrics", "get_", "convert", "sign_", "verify_"],
        }
    }

    /// First category with a pattern contained in the method name.
    pub fn of(method_name: &str) -> Category {
        let lower = method_name.to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.patterns().iter().any(|p| lower.contains(p)))
            .unwrap_or(Category::Utility)
    }
}

/// Derives a UUID-formatted id from the SHA-256 of `seed`.
pub fn stable_id(seed: &str) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!(
        "{}-{}-{}-{}-{}",
        &digest[0..8],
        &digest[8..12],
        &digest[12..16],
        &digest[16..20],
        &digest[20..32]
    )
}

/// Builds the collection.
///
/// Fails with `DuplicateOperationId` when two items of one version share an
/// operationId.
pub fn build(items: &[OpenApiPathItem]) -> AppResult<PostmanCollection> {
    let mut by_version: BTreeMap<ApiVersion, Vec<&OpenApiPathItem>> = BTreeMap::new();
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert((item.version, item.operation_id.as_str())) {
            return Err(AppError::DuplicateOperationId {
                version: item.version,
                operation_id: item.operation_id.clone(),
            });
        }
        by_version.entry(item.version).or_default().push(item);
    }

    let mut version_folders = Vec::new();
    for (version, mut items) in by_version {
        items.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));

        let mut categories: BTreeMap<Category, Vec<PostmanItem>> = BTreeMap::new();
        for item in items {
            let request = build_request(item)?;
            categories
                .entry(Category::of(&item.operation_id))
                .or_default()
                .push(PostmanItem::Request(Box::new(request)));
        }
        tracing::debug!(version = %version, categories = categories.len(), "Built version folder");

        version_folders.push(PostmanItem::Folder(FolderItem {
            name: version.as_str().to_string(),
            description: format!("KDF {} API methods", version.as_str().to_uppercase()),
            item: categories
                .into_iter()
                .map(|(category, requests)| {
                    PostmanItem::Folder(FolderItem {
                        name: category.folder_name().to_string(),
                        description: String::new(),
                        item: requests,
                    })
                })
                .collect(),
        }));
    }

    let collection = PostmanCollection {
        info: CollectionInfo {
            postman_id: stable_id("kdf-collection"),
            name: "Komodo DeFi Framework API".into(),
            description: format!(
                "KDF RPC requests generated from the API documentation ({} requests).\n\n\
                 Set `kdf_url` and `userpass` in the environment before sending.",
                items.len()
            ),
            schema: COLLECTION_SCHEMA.into(),
        },
        item: version_folders,
        event: vec![script_event("prerequest", pre_request_script())],
        variable: vec![
            PostmanVariable {
                key: "kdf_url".into(),
                value: DEFAULT_KDF_URL.into(),
                description: "KDF instance URL with IP/domain and port".into(),
            },
            PostmanVariable {
                key: "userpass".into(),
                value: DEFAULT_USERPASS.into(),
                description: "RPC authentication password".into(),
            },
        ],
    };
    tracing::info!(requests = collection.request_count(), "Built Postman collection");
    Ok(collection)
}

/// Builds the environment matching the collection variables.
pub fn build_environment() -> PostmanEnvironment {
    PostmanEnvironment {
        id: stable_id("kdf-environment"),
        name: "KDF Environment".into(),
        values: vec![
            EnvironmentValue {
                key: "kdf_url".into(),
                value: DEFAULT_KDF_URL.into(),
                kind: "default".into(),
                enabled: true,
            },
            EnvironmentValue {
                key: "userpass".into(),
                value: DEFAULT_USERPASS.into(),
                kind: "secret".into(),
                enabled: true,
            },
        ],
    }
}

/// Pretty JSON with a trailing newline.
pub fn to_json_string<T: Serialize>(value: &T) -> AppResult<String> {
    let mut text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::General(format!("Failed to serialize Postman output: {}", e)))?;
    text.push('\n');
    Ok(text)
}

fn build_request(item: &OpenApiPathItem) -> AppResult<RequestItem> {
    let body = request_body(item);
    let raw = serde_json::to_string_pretty(&body)
        .map_err(|e| AppError::General(format!("Failed to serialize body of {}: {}", item.operation_id, e)))?;

    Ok(RequestItem {
        id: stable_id(&format!("{}:{}", item.version, item.operation_id)),
        name: item.operation_id.clone(),
        request: PostmanRequest {
            method: item.http_method.to_uppercase(),
            header: vec![PostmanHeader {
                key: "Content-Type".into(),
                value: "application/json".into(),
            }],
            body: PostmanBody {
                mode: "raw".into(),
                raw,
                options: json!({ "raw": { "language": "json" } }),
            },
            url: PostmanUrl {
                raw: KDF_URL_VAR.into(),
                host: vec![KDF_URL_VAR.into()],
            },
            description: request_description(item),
        },
        event: vec![script_event("test", test_script(&item.operation_id))],
    })
}

/// Request example with `userpass` templated, or a minimal envelope.
fn request_body(item: &OpenApiPathItem) -> JsonValue {
    match item.request_example() {
        Some(JsonValue::Object(example)) => {
            let mut body = example.clone();
            body.insert("userpass".into(), USERPASS_VAR.into());
            JsonValue::Object(body)
        }
        Some(other) => other.clone(),
        None => {
            let mut body = Map::new();
            body.insert("userpass".into(), USERPASS_VAR.into());
            body.insert("method".into(), item.operation_id.clone().into());
            if item.version == ApiVersion::V2 {
                body.insert("mmrpc".into(), "2.0".into());
            }
            JsonValue::Object(body)
        }
    }
}

fn request_description(item: &OpenApiPathItem) -> String {
    let mut parts = vec![format!("**Method**: `{}` ({})", item.operation_id, item.version)];
    if !item.summary.is_empty() && item.summary != item.operation_id {
        parts.push(item.summary.clone());
    }
    if !item.description.is_empty() {
        parts.push(item.description.clone());
    }
    if let Some(doc) = item.mdx_doc_path() {
        parts.push(format!("Source: `{}`", doc));
    }
    parts.join("\n\n")
}

fn test_script(operation_id: &str) -> Vec<String> {
    format!(
        r#"// Test script for {operation_id}
pm.test("Status code is 200", function () {{
    pm.response.to.have.status(200);
}});

pm.test("Response has result", function () {{
    const response = pm.response.json();
    pm.expect(response).to.have.property('result');
}});

pm.test("No error in response", function () {{
    const response = pm.response.json();
    pm.expect(response).to.not.have.property('error');
}});"#
    )
    .lines()
    .map(str::to_string)
    .collect()
}

fn pre_request_script() -> Vec<String> {
    [
        "if (!pm.environment.get('kdf_url')) {",
        "    console.warn('kdf_url environment variable not set');",
        "}",
        "if (!pm.environment.get('userpass')) {",
        "    console.warn('userpass environment variable not set');",
        "}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn script_event(listen: &str, exec: Vec<String>) -> PostmanEvent {
    PostmanEvent {
        listen: listen.into(),
        script: PostmanScript {
            kind: "text/javascript".into(),
            exec,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn item(version: ApiVersion, name: &str, example: Option<JsonValue>) -> OpenApiPathItem {
        let mut custom_fields = IndexMap::new();
        custom_fields.insert("x-mdx-doc-path".to_string(), json!(format!("docs/{}.mdx", name)));
        OpenApiPathItem {
            version,
            path_key: format!("/api/{}/{}", version, name),
            http_method: "post".into(),
            operation_id: name.into(),
            summary: name.into(),
            description: String::new(),
            custom_fields,
            parameters: Vec::new(),
            request_body: example.map(|e| json!({"content": {"application/json": {"example": e}}})),
            responses: IndexMap::new(),
        }
    }

    #[test]
    fn test_categories_first_match() {
        assert_eq!(Category::of("enable_eth_with_tokens"), Category::Activation);
        assert_eq!(Category::of("task::enable_lightning::init"), Category::Activation);
        assert_eq!(Category::of("lightning::channels::open_channel"), Category::Lightning);
        assert_eq!(Category::of("my_balance"), Category::Wallet);
        assert_eq!(Category::of("stream::balance::enable"), Category::Activation);
        assert_eq!(Category::of("stream::disable"), Category::Streaming);
        assert_eq!(Category::of("task::withdraw::status"), Category::Wallet);
        assert_eq!(Category::of("version"), Category::Utility);
        assert_eq!(Category::of("stop"), Category::Utility);
    }

    #[test]
    fn test_stable_id_format() {
        let id = stable_id("v2:withdraw");
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
        assert_eq!(id, stable_id("v2:withdraw"));
        assert_ne!(id, stable_id("v1:withdraw"));
    }

    #[test]
    fn test_build_structure_and_order() {
        let items = vec![
            item(ApiVersion::V2, "version", None),
            item(ApiVersion::V1, "withdraw", None),
            item(ApiVersion::V1, "my_balance", None),
        ];
        let collection = build(&items).unwrap();
        assert_eq!(collection.info.schema, COLLECTION_SCHEMA);
        assert_eq!(collection.request_count(), 3);

        let PostmanItem::Folder(v1) = &collection.item[0] else {
            panic!("expected version folder");
        };
        assert_eq!(v1.name, "v1");
        let PostmanItem::Folder(wallet) = &v1.item[0] else {
            panic!("expected category folder");
        };
        assert_eq!(wallet.name, "Wallet Management");
        let names: Vec<&str> = wallet
            .item
            .iter()
            .filter_map(|i| match i {
                PostmanItem::Request(r) => Some(r.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["my_balance", "withdraw"]);
    }

    #[test]
    fn test_duplicate_operation_id() {
        let items = vec![
            item(ApiVersion::V2, "withdraw", None),
            item(ApiVersion::V2, "withdraw", None),
        ];
        assert!(matches!(
            build(&items),
            Err(AppError::DuplicateOperationId { version: ApiVersion::V2, .. })
        ));
        // same name across versions is fine
        let items = vec![item(ApiVersion::V1, "withdraw", None), item(ApiVersion::V2, "withdraw", None)];
        assert!(build(&items).is_ok());
    }

    #[test]
    fn test_body_from_example_templates_userpass() {
        let example = json!({"userpass": "secret", "method": "validateaddress", "coin": "KMD"});
        let collection = build(&[item(ApiVersion::V1, "validateaddress", Some(example))]).unwrap();
        let body = collection
            .find_request("validateaddress")
            .unwrap()
            .request
            .body_json()
            .unwrap();
        assert_eq!(
            body,
            json!({"userpass": "{{userpass}}", "method": "validateaddress", "coin": "KMD"})
        );
    }

    #[test]
    fn test_minimal_bodies() {
        let collection = build(&[
            item(ApiVersion::V1, "stop", None),
            item(ApiVersion::V2, "get_enabled_coins", None),
        ])
        .unwrap();
        let v1 = collection.find_request("stop").unwrap().request.body_json().unwrap();
        assert_eq!(v1, json!({"userpass": "{{userpass}}", "method": "stop"}));
        let v2 = collection
            .find_request("get_enabled_coins")
            .unwrap()
            .request
            .body_json()
            .unwrap();
        assert_eq!(v2["mmrpc"], "2.0");
    }

    #[test]
    fn test_scripts_and_variables() {
        let collection = build(&[item(ApiVersion::V1, "stop", None)]).unwrap();
        assert_eq!(collection.event[0].listen, "prerequest");
        let request = collection.find_request("stop").unwrap();
        let script = request.event[0].script.exec.join("\n");
        assert!(script.contains("have.status(200)"));
        assert!(script.contains("property('result')"));
        assert!(script.contains("not.have.property('error')"));
        let keys: Vec<&str> = collection.variable.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["kdf_url", "userpass"]);

        let env = build_environment();
        assert_eq!(env.get("kdf_url"), Some(DEFAULT_KDF_URL));
        assert_eq!(env.get("userpass"), Some(DEFAULT_USERPASS));
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let items = vec![item(ApiVersion::V2, "version", None)];
        let a = to_json_string(&build(&items).unwrap()).unwrap();
        let b = to_json_string(&build(&items).unwrap()).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with('\n'));
    }
}
