#![deny(missing_docs)]

//! # Field Diff
//!
//! Compares the parameter fields documented for a method against the fields
//! an upstream source reports for it. Detects fields missing on either side
//! and type mismatches when both sides carry a type.

use crate::coverage::CatalogField;
use std::collections::BTreeMap;
use std::fmt::Display;

/// A single field-level discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDiff {
    /// Upstream has the field, the docs do not.
    MissingInDocs {
        /// Dotted field path.
        path: String,
    },

    /// The docs have the field, upstream does not.
    MissingUpstream {
        /// Dotted field path.
        path: String,
    },

    /// Both sides have the field with different types.
    TypeMismatch {
        /// Dotted field path.
        path: String,
        /// Type in the docs.
        documented: String,
        /// Type upstream.
        upstream: String,
    },
}

impl FieldDiff {
    /// Field path the discrepancy is about.
    pub fn path(&self) -> &str {
        match self {
            FieldDiff::MissingInDocs { path }
            | FieldDiff::MissingUpstream { path }
            | FieldDiff::TypeMismatch { path, .. } => path,
        }
    }
}

impl Display for FieldDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldDiff::MissingInDocs { path } => write!(f, "Missing in docs '{}'", path),
            FieldDiff::MissingUpstream { path } => write!(f, "Not found upstream '{}'", path),
            FieldDiff::TypeMismatch {
                path,
                documented,
                upstream,
            } => write!(
                f,
                "Type mismatch on '{}': documented '{}', upstream '{}'",
                path, documented, upstream
            ),
        }
    }
}

/// Calculates the discrepancies between documented and upstream fields.
/// Output is sorted by field path.
pub fn calculate_diff(documented: &[CatalogField], upstream: &[CatalogField]) -> Vec<FieldDiff> {
    let docs: BTreeMap<&str, &CatalogField> = documented.iter().map(|f| (f.path.as_str(), f)).collect();
    let ups: BTreeMap<&str, &CatalogField> = upstream.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut diffs = Vec::new();
    for (path, doc_field) in &docs {
        match ups.get(path) {
            None => diffs.push(FieldDiff::MissingUpstream {
                path: path.to_string(),
            }),
            Some(up_field) => {
                if let (Some(d), Some(u)) = (&doc_field.kind, &up_field.kind) {
                    if normalize_type(d) != normalize_type(u) {
                        diffs.push(FieldDiff::TypeMismatch {
                            path: path.to_string(),
                            documented: d.clone(),
                            upstream: u.clone(),
                        });
                    }
                }
            }
        }
    }
    for path in ups.keys().filter(|p| !docs.contains_key(*p)) {
        diffs.push(FieldDiff::MissingInDocs {
            path: path.to_string(),
        });
    }
    diffs.sort_by(|a, b| a.path().cmp(b.path()));
    diffs
}

/// Collapses spelling variants (`str`/`String`, `u64`/`integer`, ...).
fn normalize_type(ty: &str) -> &'static str {
    let lower: String = ty.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    match lower.as_str() {
        "str" | "string" | "&str" | "enum" => "string",
        "bool" | "boolean" => "boolean",
        "object" | "map" | "struct" | "dict" => "object",
        l if l.starts_with("vec<") || l.starts_with("array") || l.starts_with("list") || l.ends_with("[]") => "array",
        "int" | "integer" | "number" | "float" | "double" | "decimal" | "u8" | "u16" | "u32" | "u64" | "usize"
        | "i8" | "i16" | "i32" | "i64" | "isize" | "f32" | "f64" => "number",
        _ => "other",
    }
}
