//! # Postman Models
//!
//! Serializable subset of the Postman collection v2.1.0 format.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Collection schema URL.
pub const COLLECTION_SCHEMA: &str =
    "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

/// A complete collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanCollection {
    /// Collection metadata.
    pub info: CollectionInfo,
    /// Top-level folders (one per API version).
    pub item: Vec<PostmanItem>,
    /// Collection-level scripts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<PostmanEvent>,
    /// Collection variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable: Vec<PostmanVariable>,
}

impl PostmanCollection {
    /// Number of requests in all folders.
    pub fn request_count(&self) -> usize {
        self.item.iter().map(PostmanItem::request_count).sum()
    }

    /// Finds a request by name anywhere in the tree.
    pub fn find_request(&self, name: &str) -> Option<&RequestItem> {
        self.item.iter().find_map(|item| item.find_request(name))
    }
}

/// Collection metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Stable collection id.
    #[serde(rename = "_postman_id")]
    pub postman_id: String,
    /// Display name.
    pub name: String,
    /// Markdown description.
    pub description: String,
    /// Schema URL.
    pub schema: String,
}

/// Folder or request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostmanItem {
    /// Folder of items.
    Folder(FolderItem),
    /// Single request.
    Request(Box<RequestItem>),
}

impl PostmanItem {
    fn request_count(&self) -> usize {
        match self {
            PostmanItem::Folder(folder) => folder.item.iter().map(PostmanItem::request_count).sum(),
            PostmanItem::Request(_) => 1,
        }
    }

    fn find_request(&self, name: &str) -> Option<&RequestItem> {
        match self {
            PostmanItem::Folder(folder) => folder.item.iter().find_map(|i| i.find_request(name)),
            PostmanItem::Request(req) if req.name == name => Some(req.as_ref()),
            PostmanItem::Request(_) => None,
        }
    }
}

/// Named folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderItem {
    /// Folder name.
    pub name: String,
    /// Folder description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Children.
    pub item: Vec<PostmanItem>,
}

/// Named request with its test script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    /// Stable request id.
    pub id: String,
    /// Request name (the operationId).
    pub name: String,
    /// The request itself.
    pub request: PostmanRequest,
    /// Test scripts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<PostmanEvent>,
}

/// HTTP request description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanRequest {
    /// HTTP verb.
    pub method: String,
    /// Headers.
    pub header: Vec<PostmanHeader>,
    /// Raw JSON body.
    pub body: PostmanBody,
    /// Target URL.
    pub url: PostmanUrl,
    /// Markdown description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PostmanRequest {
    /// Body parsed back into JSON.
    pub fn body_json(&self) -> Option<JsonValue> {
        serde_json::from_str(&self.body.raw).ok()
    }
}

/// Header entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanHeader {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: String,
}

/// Raw body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanBody {
    /// Always `raw`.
    pub mode: String,
    /// Body text.
    pub raw: String,
    /// Language hint.
    pub options: JsonValue,
}

/// URL split the way Postman stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanUrl {
    /// Full URL text.
    pub raw: String,
    /// Host segments.
    pub host: Vec<String>,
}

/// Script hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanEvent {
    /// `test` or `prerequest`.
    pub listen: String,
    /// Script lines.
    pub script: PostmanScript,
}

/// JavaScript source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanScript {
    /// Always `text/javascript`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source lines.
    pub exec: Vec<String>,
}

/// Collection variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanVariable {
    /// Variable name.
    pub key: String,
    /// Default value.
    pub value: String,
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Postman environment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmanEnvironment {
    /// Stable environment id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Variables.
    pub values: Vec<EnvironmentValue>,
}

impl PostmanEnvironment {
    /// Value of a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }
}

/// Environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentValue {
    /// Variable name.
    pub key: String,
    /// Value.
    pub value: String,
    /// `default` or `secret`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the variable is active.
    pub enabled: bool,
}
