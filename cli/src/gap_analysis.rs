#![deny(missing_docs)]

//! # Gap Analysis Command
//!
//! Compares the manifest with the emitted path specs and, when sources are
//! given, with the upstream method list (JSON lists or KDF dispatcher source).
//! Unreachable sources are recorded in the report instead of aborting.

use crate::common::{ProjectPaths, Selection};
use crate::fetch::fetcher_for;
use docgen_core::coverage::{fetch_dispatcher, fetch_with_retry};
use docgen_core::fs_utils::write_atomic;
use docgen_core::parser::{V1_RULES, V2_RULES};
use docgen_core::{
    compare, documented_catalog, load_path_items, AppError, AppResult, CoverageReport, MethodCatalog,
    PipelineConfig,
};
use std::path::PathBuf;

/// Report rendering.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON document.
    Json,
}

/// Arguments for the gap-analysis command.
#[derive(clap::Args, Debug, Clone)]
pub struct GapAnalysisArgs {
    #[clap(flatten)]
    pub(crate) paths: ProjectPaths,

    /// Upstream JSON method list (file or URL). Repeatable.
    #[clap(long)]
    pub upstream: Vec<String>,

    /// MMRPC 2.0 dispatcher source, `dispatcher.rs` (file or URL). Repeatable.
    #[clap(long)]
    pub dispatcher: Vec<String>,

    /// Legacy dispatcher source, `dispatcher_legacy.rs` (file or URL). Repeatable.
    #[clap(long)]
    pub legacy_dispatcher: Vec<String>,

    /// Output format.
    #[clap(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Write the report to this file instead of stdout.
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Save the combined upstream method list as JSON.
    #[clap(long)]
    pub save_upstream: Option<PathBuf>,

    /// Exit with failure when any gap is found.
    #[clap(long)]
    pub fail_on_gaps: bool,
}

impl GapAnalysisArgs {
    fn has_upstream(&self) -> bool {
        !(self.upstream.is_empty() && self.dispatcher.is_empty() && self.legacy_dispatcher.is_empty())
    }
}

/// Loads every upstream source. Returns the merged catalog (when at least
/// one source succeeded) and the failures.
pub fn load_upstream(args: &GapAnalysisArgs, config: &PipelineConfig) -> (Option<MethodCatalog>, Vec<AppError>) {
    let mut merged: Option<MethodCatalog> = None;
    let mut failures = Vec::new();

    let lists = args.upstream.iter().map(|s| (s, None));
    let v2 = args.dispatcher.iter().map(|s| (s, Some(V2_RULES)));
    let v1 = args.legacy_dispatcher.iter().map(|s| (s, Some(V1_RULES)));

    for (source, rules) in lists.chain(v2).chain(v1) {
        let loaded = fetcher_for(source, &config.upstream).and_then(|fetcher| match rules {
            Some(rules) => fetch_dispatcher(fetcher.as_ref(), rules, &config.upstream),
            None => fetch_with_retry(fetcher.as_ref(), &config.upstream),
        });
        match loaded {
            Ok(catalog) => {
                tracing::info!(source = %source, methods = catalog.len(), "Loaded upstream methods");
                merged.get_or_insert_with(MethodCatalog::new).extend(catalog);
            }
            Err(error) => {
                tracing::error!(source = %source, error = %error, "Upstream source unavailable");
                failures.push(error);
            }
        }
    }
    (merged, failures)
}

/// Builds the report. `emitted` overrides reading the path directory; its
/// field lists should already come from the parameter tables.
pub fn build_report(
    args: &GapAnalysisArgs,
    config: &PipelineConfig,
    emitted: Option<MethodCatalog>,
) -> AppResult<CoverageReport> {
    let registry = args.paths.load_registry(&Selection::default())?;
    let emitted = match emitted {
        Some(catalog) => catalog,
        None => {
            let mut catalog = MethodCatalog::from_path_items(&load_path_items(&args.paths.paths_dir)?);
            if args.has_upstream() {
                catalog.overlay_fields(&documented_catalog(&registry, &args.paths.docs_root, config));
            }
            catalog
        }
    };

    let (upstream, failures) = if args.has_upstream() {
        load_upstream(args, config)
    } else {
        (None, Vec::new())
    };

    if let (Some(path), Some(catalog)) = (&args.save_upstream, &upstream) {
        let json = serde_json::to_string_pretty(&catalog.to_json())
            .map_err(|e| AppError::General(format!("Failed to serialize method list: {}", e)))?;
        write_atomic(path, &format!("{}\n", json))?;
        println!("Upstream method list written to {}", path.display());
    }

    let mut report = compare(&registry, &emitted, upstream.as_ref());
    for failure in &failures {
        match failure {
            AppError::UpstreamFetch { .. } => report.record_fetch_failure(failure),
            other => report.record_fetch_failure(&AppError::UpstreamFetch {
                source_name: "configuration".into(),
                attempts: 0,
                reason: other.to_string(),
            }),
        }
    }
    Ok(report)
}

/// Prints or writes the report.
pub fn output_report(args: &GapAnalysisArgs, report: &CoverageReport) -> AppResult<()> {
    let rendered = match args.format {
        ReportFormat::Text => report.render_text(),
        ReportFormat::Json => format!("{}\n", report.to_json()?),
    };
    match &args.output {
        Some(path) => {
            write_atomic(path, &rendered)?;
            println!("Coverage report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Executes the command.
pub fn execute(args: &GapAnalysisArgs, config: &PipelineConfig) -> AppResult<bool> {
    let report = build_report(args, config, None)?;
    output_report(args, &report)?;
    Ok(!(args.fail_on_gaps && report.has_gaps()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgen_core::ApiVersion;
    use std::fs;

    fn args(dir: &std::path::Path) -> GapAnalysisArgs {
        GapAnalysisArgs {
            paths: ProjectPaths {
                manifest: dir.join("method_pages.json"),
                docs_root: dir.to_path_buf(),
                components: dir.join("components"),
                paths_dir: dir.join("paths"),
            },
            upstream: Vec::new(),
            dispatcher: Vec::new(),
            legacy_dispatcher: Vec::new(),
            format: ReportFormat::Json,
            output: None,
            save_upstream: None,
            fail_on_gaps: false,
        }
    }

    #[test]
    fn test_upstream_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("method_pages.json"), r#"{"v1": {"A": "a.mdx", "B": "b.mdx"}}"#).unwrap();
        fs::write(dir.path().join("upstream.json"), r#"{"v1": ["B", "C"]}"#).unwrap();

        let mut a = args(dir.path());
        a.upstream = vec![
            dir.path().join("upstream.json").display().to_string(),
            dir.path().join("missing.json").display().to_string(),
        ];
        let config = PipelineConfig {
            upstream: docgen_core::config::UpstreamConfig {
                retries: 2,
                backoff_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let report = build_report(&a, &config, None).unwrap();
        let v1 = report.version(ApiVersion::V1).unwrap();
        assert_eq!(v1.matched.iter().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(v1.documented_only.iter().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(v1.spec_only.iter().collect::<Vec<_>>(), vec!["C"]);
        assert_eq!(report.fetch_failures.len(), 1);
        assert_eq!(report.fetch_failures[0].attempts, 2);
    }
}
