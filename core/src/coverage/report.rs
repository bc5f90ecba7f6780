//! # Coverage Report
//!
//! Three-way comparison of the registry, the emitted specs and an optional
//! upstream method list. Pure: the same inputs always yield the same report.

use super::catalog::MethodCatalog;
use crate::diff::{calculate_diff, FieldDiff};
use crate::error::{AppError, AppResult};
use crate::registry::{ApiVersion, MethodRegistry};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Number of entries listed per gap section in the text rendering.
const TEXT_LIST_LIMIT: usize = 10;

/// Which set the registry was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSource {
    /// The upstream source-of-truth list.
    Upstream,
    /// The emitted specs (no upstream list supplied).
    Emitted,
}

/// Gaps for one API version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionCoverage {
    /// API version.
    pub version: ApiVersion,
    /// In the registry, absent from the reference set.
    pub documented_only: BTreeSet<String>,
    /// In the reference set, absent from the registry.
    pub spec_only: BTreeSet<String>,
    /// In both.
    pub matched: BTreeSet<String>,
    /// In the registry but no spec was emitted.
    pub not_emitted: BTreeSet<String>,
    /// Emitted specs with no registry entry.
    pub orphaned_specs: BTreeSet<String>,
    /// Field-level discrepancies per method.
    pub mismatched_fields: BTreeMap<String, Vec<FieldDiff>>,
    /// Size of the registry for this version.
    pub registry_total: usize,
    /// Size of the reference set for this version.
    pub reference_total: usize,
    /// `matched / reference_total * 100`, 0 for an empty reference.
    pub coverage_percentage: f64,
}

/// An upstream source that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    /// File or URL.
    pub source_name: String,
    /// Attempts made.
    pub attempts: u32,
    /// Last error.
    pub reason: String,
}

/// Full coverage report, regenerated on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    /// What the registry was compared against.
    pub reference: ReferenceSource,
    /// Per-version results, in version order.
    pub versions: Vec<VersionCoverage>,
    /// Upstream sources that failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fetch_failures: Vec<FetchFailure>,
}

/// Compares the registry with the emitted specs and, when given, the
/// upstream list.
pub fn compare(
    registry: &MethodRegistry,
    emitted: &MethodCatalog,
    upstream: Option<&MethodCatalog>,
) -> CoverageReport {
    let versions: BTreeSet<ApiVersion> = registry
        .versions()
        .chain(emitted.versions())
        .chain(upstream.into_iter().flat_map(|u| u.versions()))
        .collect();

    let versions = versions
        .into_iter()
        .map(|version| {
            let documented: BTreeSet<String> = registry.method_names(version).map(str::to_string).collect();
            let emitted_names: BTreeSet<String> = emitted.names(version).map(str::to_string).collect();
            let reference: BTreeSet<String> = match upstream {
                Some(u) => u.names(version).map(str::to_string).collect(),
                None => emitted_names.clone(),
            };

            let matched: BTreeSet<String> = documented.intersection(&reference).cloned().collect();
            let mismatched_fields = upstream
                .map(|u| field_mismatches(version, &matched, emitted, u))
                .unwrap_or_default();
            let coverage_percentage = if reference.is_empty() {
                0.0
            } else {
                matched.len() as f64 / reference.len() as f64 * 100.0
            };

            VersionCoverage {
                version,
                documented_only: documented.difference(&reference).cloned().collect(),
                spec_only: reference.difference(&documented).cloned().collect(),
                not_emitted: documented.difference(&emitted_names).cloned().collect(),
                orphaned_specs: emitted_names.difference(&documented).cloned().collect(),
                mismatched_fields,
                registry_total: documented.len(),
                reference_total: reference.len(),
                coverage_percentage,
                matched,
            }
        })
        .collect();

    CoverageReport {
        reference: if upstream.is_some() {
            ReferenceSource::Upstream
        } else {
            ReferenceSource::Emitted
        },
        versions,
        fetch_failures: Vec::new(),
    }
}

fn field_mismatches(
    version: ApiVersion,
    matched: &BTreeSet<String>,
    documented: &MethodCatalog,
    upstream: &MethodCatalog,
) -> BTreeMap<String, Vec<FieldDiff>> {
    matched
        .iter()
        .filter_map(|name| {
            let up = upstream.fields(version, name)?;
            let docs = documented.fields(version, name)?;
            let diffs = calculate_diff(docs, up);
            (!diffs.is_empty()).then(|| (name.clone(), diffs))
        })
        .collect()
}

impl CoverageReport {
    /// Results for one version.
    pub fn version(&self, version: ApiVersion) -> Option<&VersionCoverage> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Records an `UpstreamFetch` error. Other errors are ignored.
    pub fn record_fetch_failure(&mut self, error: &AppError) {
        if let AppError::UpstreamFetch {
            source_name,
            attempts,
            reason,
        } = error
        {
            self.fetch_failures.push(FetchFailure {
                source_name: source_name.clone(),
                attempts: *attempts,
                reason: reason.clone(),
            });
        }
    }

    /// Whether any gap or discrepancy was found.
    pub fn has_gaps(&self) -> bool {
        self.versions.iter().any(|v| {
            !v.documented_only.is_empty()
                || !v.spec_only.is_empty()
                || !v.not_emitted.is_empty()
                || !v.mismatched_fields.is_empty()
        })
    }

    /// Coverage over all versions.
    pub fn overall_coverage(&self) -> f64 {
        let reference: usize = self.versions.iter().map(|v| v.reference_total).sum();
        let matched: usize = self.versions.iter().map(|v| v.matched.len()).sum();
        if reference == 0 {
            0.0
        } else {
            matched as f64 / reference as f64 * 100.0
        }
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::General(format!("Failed to serialize coverage report: {}", e)))
    }

    /// Human-readable rendering.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "KDF DOCUMENTATION COVERAGE REPORT");
        let _ = writeln!(out, "{}", rule);
        let reference = match self.reference {
            ReferenceSource::Upstream => "upstream method list",
            ReferenceSource::Emitted => "emitted specs",
        };
        let _ = writeln!(out, "Reference: {}", reference);
        let _ = writeln!(out);

        for v in &self.versions {
            let _ = writeln!(out, "{} API Methods:", v.version.as_str().to_uppercase());
            let _ = writeln!(out, "{}", "-".repeat(40));
            let _ = writeln!(out, "  Registry methods: {}", v.registry_total);
            let _ = writeln!(out, "  Reference methods: {}", v.reference_total);
            let _ = writeln!(out, "  Matched methods: {}", v.matched.len());
            let _ = writeln!(out, "  Coverage: {:.1}%", v.coverage_percentage);
            let _ = writeln!(out);
            write_list(&mut out, "Documented only", &v.documented_only);
            write_list(&mut out, "Missing from docs", &v.spec_only);
            write_list(&mut out, "Not emitted", &v.not_emitted);
            write_list(&mut out, "Orphaned specs", &v.orphaned_specs);
            if !v.mismatched_fields.is_empty() {
                let _ = writeln!(out, "  Field mismatches ({}):", v.mismatched_fields.len());
                for (method, diffs) in v.mismatched_fields.iter().take(TEXT_LIST_LIMIT) {
                    let joined: Vec<String> = diffs.iter().map(ToString::to_string).collect();
                    let _ = writeln!(out, "    - {}: {}", method, joined.join("; "));
                }
                if v.mismatched_fields.len() > TEXT_LIST_LIMIT {
                    let _ = writeln!(out, "    ... and {} more", v.mismatched_fields.len() - TEXT_LIST_LIMIT);
                }
                let _ = writeln!(out);
            }
        }

        let _ = writeln!(out, "{}", "=".repeat(40));
        let _ = writeln!(out, "OVERALL SUMMARY:");
        let registry: usize = self.versions.iter().map(|v| v.registry_total).sum();
        let reference_total: usize = self.versions.iter().map(|v| v.reference_total).sum();
        let matched: usize = self.versions.iter().map(|v| v.matched.len()).sum();
        let _ = writeln!(out, "  Total registry methods: {}", registry);
        let _ = writeln!(out, "  Total reference methods: {}", reference_total);
        let _ = writeln!(out, "  Total matched methods: {}", matched);
        let _ = writeln!(out, "  Overall coverage: {:.1}%", self.overall_coverage());
        for failure in &self.fetch_failures {
            let _ = writeln!(
                out,
                "  Upstream fetch failed: {} after {} attempt(s): {}",
                failure.source_name, failure.attempts, failure.reason
            );
        }
        let _ = writeln!(out, "{}", rule);
        out
    }
}

fn write_list(out: &mut String, title: &str, items: &BTreeSet<String>) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {} ({}):", title, items.len());
    for item in items.iter().take(TEXT_LIST_LIMIT) {
        let _ = writeln!(out, "    - {}", item);
    }
    if items.len() > TEXT_LIST_LIMIT {
        let _ = writeln!(out, "    ... and {} more", items.len() - TEXT_LIST_LIMIT);
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CatalogField;
    use pretty_assertions::assert_eq;

    fn registry() -> MethodRegistry {
        MethodRegistry::load(r#"{"v1": [{"method_name": "A", "mdx_path": "a.mdx"}, {"method_name": "B", "mdx_path": "b.mdx"}]}"#)
            .unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_upstream_scenario() {
        let mut emitted = MethodCatalog::new();
        emitted.insert(ApiVersion::V1, "A", None);
        emitted.insert(ApiVersion::V1, "B", None);
        let upstream = MethodCatalog::parse_json(r#"{"v1": ["B", "C"]}"#).unwrap();

        let report = compare(&registry(), &emitted, Some(&upstream));
        let v1 = report.version(ApiVersion::V1).unwrap();
        assert_eq!(v1.documented_only, set(&["A"]));
        assert_eq!(v1.spec_only, set(&["C"]));
        assert_eq!(v1.matched, set(&["B"]));
        assert!(v1.not_emitted.is_empty());
        assert_eq!(v1.coverage_percentage, 50.0);
        assert_eq!(report.reference, ReferenceSource::Upstream);
    }

    #[test]
    fn test_without_upstream_compares_emitted() {
        let mut emitted = MethodCatalog::new();
        emitted.insert(ApiVersion::V1, "B", None);
        emitted.insert(ApiVersion::V1, "Z", None);

        let report = compare(&registry(), &emitted, None);
        let v1 = report.version(ApiVersion::V1).unwrap();
        assert_eq!(v1.documented_only, set(&["A"]));
        assert_eq!(v1.spec_only, set(&["Z"]));
        assert_eq!(v1.not_emitted, set(&["A"]));
        assert_eq!(v1.orphaned_specs, set(&["Z"]));
        assert_eq!(report.reference, ReferenceSource::Emitted);
    }

    #[test]
    fn test_field_mismatches() {
        let field = |p: &str| CatalogField {
            path: p.into(),
            kind: None,
        };
        let mut emitted = MethodCatalog::new();
        emitted.insert(ApiVersion::V1, "B", Some(vec![field("coin"), field("address")]));
        let upstream =
            MethodCatalog::parse_json(r#"{"v1": [{"name": "B", "params": ["coin", "format"]}, "A"]}"#).unwrap();

        let report = compare(&registry(), &emitted, Some(&upstream));
        let v1 = report.version(ApiVersion::V1).unwrap();
        let diffs = &v1.mismatched_fields["B"];
        assert_eq!(diffs.len(), 2);
        // A has no upstream field list
        assert!(!v1.mismatched_fields.contains_key("A"));
        assert!(report.has_gaps());
    }

    #[test]
    fn test_compare_is_pure() {
        let emitted = MethodCatalog::new();
        let a = compare(&registry(), &emitted, None);
        let b = compare(&registry(), &emitted, None);
        assert_eq!(a, b);
        assert_eq!(a.render_text(), b.render_text());
    }

    #[test]
    fn test_render_and_fetch_failures() {
        let mut report = compare(&registry(), &MethodCatalog::new(), None);
        report.record_fetch_failure(&AppError::UpstreamFetch {
            source_name: "https://example.com/methods.json".into(),
            attempts: 3,
            reason: "timeout".into(),
        });
        report.record_fetch_failure(&AppError::General("ignored".into()));
        assert_eq!(report.fetch_failures.len(), 1);

        let text = report.render_text();
        assert!(text.contains("V1 API Methods:"));
        assert!(text.contains("Documented only (2):"));
        assert!(text.contains("Upstream fetch failed: https://example.com/methods.json after 3 attempt(s)"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["reference"], "emitted");
        assert_eq!(json["versions"][0]["documented_only"], serde_json::json!(["A", "B"]));
    }
}
