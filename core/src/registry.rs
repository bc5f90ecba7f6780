#![deny(missing_docs)]

//! # Method Registry
//!
//! Loads the method manifest (`method_pages.json`) into an ordered mapping of
//! method name to [`MethodEntry`] per API version.
//!
//! Two manifest shapes are accepted for each version key:
//! - a list of `{ "method_name": ..., "mdx_path": ... }` objects;
//! - an object mapping method name to MDX path.
//!
//! Duplicates are detected in both shapes, so the object form is read pair by
//! pair instead of through a map type that would silently collapse them.

use crate::error::{AppError, AppResult};
use indexmap::IndexMap;
use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Supported KDF API generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Legacy RPC (`method` at top level, no `mmrpc` field).
    V1,
    /// MMRPC 2.0.
    V2,
}

impl ApiVersion {
    /// All versions in canonical order.
    pub const ALL: [ApiVersion; 2] = [ApiVersion::V1, ApiVersion::V2];

    /// Lowercase identifier (`v1` / `v2`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }

    /// Parses a version key.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Some(ApiVersion::V1),
            "v2" => Some(ApiVersion::V2),
            _ => None,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One documented RPC method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodEntry {
    /// Method name, unique within `version`.
    pub method_name: String,
    /// API version.
    pub version: ApiVersion,
    /// MDX path exactly as written in the manifest.
    pub mdx_path: String,
    /// Output path relative to the OpenAPI `paths` directory.
    pub spec_path: PathBuf,
}

impl MethodEntry {
    /// Builds an entry, deriving its output path.
    pub fn new(method_name: &str, version: ApiVersion, mdx_path: &str) -> Self {
        let spec_path = PathBuf::from(version.as_str())
            .join(format!("{}.yaml", sanitize_file_stem(method_name)));
        Self {
            method_name: method_name.to_string(),
            version,
            mdx_path: mdx_path.to_string(),
            spec_path,
        }
    }

    /// Resolves the MDX path against a docs root.
    ///
    /// Leading `./` and `../` segments are dropped: manifests are written
    /// relative to the tooling directory, not to the docs root.
    pub fn resolve_mdx(&self, docs_root: &Path) -> PathBuf {
        let relative: PathBuf = Path::new(&self.mdx_path)
            .components()
            .skip_while(|c| matches!(c, Component::CurDir | Component::ParentDir))
            .collect();
        docs_root.join(relative)
    }
}

/// Turns a method name into a file stem (`task::enable_utxo::init` -> `task-enable_utxo-init`).
pub fn sanitize_file_stem(method_name: &str) -> String {
    method_name
        .trim()
        .replace("::", "-")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Ordered registry of methods for every version.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    versions: IndexMap<ApiVersion, IndexMap<String, MethodEntry>>,
}

impl MethodRegistry {
    /// Parses a manifest from JSON text.
    pub fn load(manifest: &str) -> AppResult<Self> {
        let raw: RawManifest = serde_json::from_str(manifest)
            .map_err(|e| AppError::ManifestParse(e.to_string()))?;

        let mut versions = IndexMap::new();
        for (key, pairs) in raw.0 {
            let version = ApiVersion::parse(&key).ok_or_else(|| {
                AppError::ManifestParse(format!("Unknown API version key '{}'", key))
            })?;
            if versions.contains_key(&version) {
                return Err(AppError::ManifestParse(format!(
                    "Version '{}' listed more than once",
                    version
                )));
            }

            let mut entries: IndexMap<String, MethodEntry> = IndexMap::new();
            for (name, mdx_path) in pairs.0 {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::ManifestParse(format!(
                        "Empty method name in {}",
                        version
                    )));
                }
                if entries.contains_key(&name) {
                    return Err(AppError::DuplicateMethodName {
                        version,
                        method: name,
                    });
                }
                let entry = MethodEntry::new(&name, version, &mdx_path);
                // distinct names can still sanitize to the same output file
                if let Some(other) = entries.values().find(|e| e.spec_path == entry.spec_path) {
                    tracing::error!(
                        %version,
                        method = %name,
                        other = %other.method_name,
                        spec_path = %entry.spec_path.display(),
                        "methods share an output file"
                    );
                    return Err(AppError::DuplicateMethodName {
                        version,
                        method: name,
                    });
                }
                entries.insert(name, entry);
            }
            debug!(%version, count = entries.len(), "loaded manifest version");
            versions.insert(version, entries);
        }

        Ok(Self { versions })
    }

    /// Reads and parses a manifest file.
    pub fn load_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::ManifestParse(format!("Failed to read manifest {:?}: {}", path, e))
        })?;
        Self::load(&text)
    }

    /// Looks up a method within a version.
    pub fn get(&self, version: ApiVersion, method_name: &str) -> Option<&MethodEntry> {
        self.versions.get(&version)?.get(method_name)
    }

    /// Versions present in the manifest, in manifest order.
    pub fn versions(&self) -> impl Iterator<Item = ApiVersion> + '_ {
        self.versions.keys().copied()
    }

    /// Entries of one version in manifest order.
    pub fn entries(&self, version: ApiVersion) -> impl Iterator<Item = &MethodEntry> {
        self.versions.get(&version).into_iter().flat_map(|m| m.values())
    }

    /// Every entry, version by version, in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = &MethodEntry> {
        self.versions.values().flat_map(|m| m.values())
    }

    /// Method names of one version.
    pub fn method_names(&self, version: ApiVersion) -> impl Iterator<Item = &str> {
        self.entries(version).map(|e| e.method_name.as_str())
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.versions.values().map(IndexMap::len).sum()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restricts the registry to one version and/or one method.
    pub fn filtered(&self, version: Option<ApiVersion>, method: Option<&str>) -> Self {
        let versions = self
            .versions
            .iter()
            .filter(|(v, _)| version.map_or(true, |want| want == **v))
            .map(|(v, entries)| {
                let kept = entries
                    .iter()
                    .filter(|(name, _)| method.map_or(true, |m| m == name.as_str()))
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect();
                (*v, kept)
            })
            .collect();
        Self { versions }
    }
}

/// Manifest top level: version key -> entries, order preserved.
struct RawManifest(Vec<(String, RawEntries)>);

/// Entries of one version as (method_name, mdx_path) pairs, duplicates kept.
struct RawEntries(Vec<(String, String)>);

#[derive(Deserialize)]
struct RawListEntry {
    #[serde(alias = "method", alias = "name")]
    method_name: String,
    #[serde(alias = "path")]
    mdx_path: String,
}

impl<'de> Deserialize<'de> for RawManifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ManifestVisitor;

        impl<'de> Visitor<'de> for ManifestVisitor {
            type Value = RawManifest;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object keyed by API version")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, RawEntries>()? {
                    out.push((key, value));
                }
                Ok(RawManifest(out))
            }
        }

        deserializer.deserialize_map(ManifestVisitor)
    }
}

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of {method_name, mdx_path} or an object of name -> path")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some(entry) = seq.next_element::<RawListEntry>()? {
                    out.push((entry.method_name, entry.mdx_path));
                }
                Ok(RawEntries(out))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((name, path)) = map.next_entry::<String, String>()? {
                    out.push((name, path));
                }
                Ok(RawEntries(out))
            }
        }

        deserializer.deserialize_any(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_list_form_preserves_order() {
        let manifest = r#"{
            "v1": [
                {"method_name": "validateaddress", "mdx_path": "src/pages/v1/validateaddress/index.mdx"},
                {"method_name": "enable", "mdx_path": "src/pages/v1/enable/index.mdx"}
            ]
        }"#;
        let reg = MethodRegistry::load(manifest).unwrap();
        let names: Vec<&str> = reg.method_names(ApiVersion::V1).collect();
        assert_eq!(names, vec!["validateaddress", "enable"]);
        let entry = reg.get(ApiVersion::V1, "enable").unwrap();
        assert_eq!(entry.spec_path, PathBuf::from("v1/enable.yaml"));
    }

    #[test]
    fn test_load_map_form() {
        let manifest = r#"{
            "v2": {
                "task::enable_utxo::init": "../../src/pages/v2/task_enable_utxo_init.mdx",
                "orderbook": "../../src/pages/v2/orderbook.mdx"
            }
        }"#;
        let reg = MethodRegistry::load(manifest).unwrap();
        assert_eq!(reg.len(), 2);
        let entry = reg.get(ApiVersion::V2, "task::enable_utxo::init").unwrap();
        assert_eq!(entry.spec_path, PathBuf::from("v2/task-enable_utxo-init.yaml"));
        assert_eq!(
            entry.resolve_mdx(Path::new("/docs")),
            PathBuf::from("/docs/src/pages/v2/task_enable_utxo_init.mdx")
        );
    }

    #[test]
    fn test_duplicate_within_version_rejected() {
        let manifest = r#"{
            "v1": [
                {"method_name": "enable_bch", "mdx_path": "a.mdx"},
                {"method_name": "enable_bch", "mdx_path": "b.mdx"}
            ]
        }"#;
        match MethodRegistry::load(manifest).unwrap_err() {
            AppError::DuplicateMethodName { version, method } => {
                assert_eq!(version, ApiVersion::V1);
                assert_eq!(method, "enable_bch");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_duplicate_in_map_form_rejected() {
        let manifest = r#"{"v1": {"enable_bch": "a.mdx", "enable_bch": "b.mdx"}}"#;
        assert!(matches!(
            MethodRegistry::load(manifest),
            Err(AppError::DuplicateMethodName { .. })
        ));
    }

    #[test]
    fn test_colliding_spec_paths_rejected() {
        let manifest = r#"{"v2": {"task::x": "a.mdx", "task-x": "b.mdx"}}"#;
        match MethodRegistry::load(manifest) {
            Err(AppError::DuplicateMethodName { version, method }) => {
                assert_eq!(version, ApiVersion::V2);
                assert_eq!(method, "task-x");
            }
            other => panic!("expected DuplicateMethodName, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_same_name_across_versions_allowed() {
        let manifest = r#"{
            "v1": [{"method_name": "orderbook", "mdx_path": "v1.mdx"}],
            "v2": [{"method_name": "orderbook", "mdx_path": "v2.mdx"}]
        }"#;
        let reg = MethodRegistry::load(manifest).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(matches!(
            MethodRegistry::load("{ not json"),
            Err(AppError::ManifestParse(_))
        ));
        assert!(matches!(
            MethodRegistry::load(r#"{"v3": []}"#),
            Err(AppError::ManifestParse(_))
        ));
        assert!(matches!(
            MethodRegistry::load(r#"{"v1": [{"method_name": "x"}]}"#),
            Err(AppError::ManifestParse(_))
        ));
    }

    #[test]
    fn test_filtered() {
        let manifest = r#"{
            "v1": {"a": "a.mdx", "b": "b.mdx"},
            "v2": {"a": "a2.mdx"}
        }"#;
        let reg = MethodRegistry::load(manifest).unwrap();
        let only = reg.filtered(Some(ApiVersion::V1), Some("b"));
        assert_eq!(only.len(), 1);
        assert!(only.get(ApiVersion::V1, "b").is_some());
    }
}
