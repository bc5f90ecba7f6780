#![deny(missing_docs)]

//! # Sync Command
//!
//! Implements the full pipeline: MDX -> OpenAPI -> Postman -> coverage report.
//!
//! 1. **MDX -> OpenAPI**: emits and merges the path specs (see `openapi`).
//! 2. **OpenAPI -> Postman**: rebuilds the collection from every spec on disk.
//! 3. **Coverage**: compares manifest, specs and upstream sources.
//!
//! Per-method failures do not stop the later steps; they only affect the
//! exit status.

use crate::common::{ProjectPaths, Selection};
use crate::gap_analysis::{self, GapAnalysisArgs, ReportFormat};
use crate::openapi::{self, OpenApiArgs};
use crate::postman::write_collection;
use docgen_core::postman::build;
use docgen_core::{load_path_items, AppResult, PipelineConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Arguments for the sync-bidirectional command.
#[derive(clap::Args, Debug, Clone)]
pub struct SyncArgs {
    #[clap(flatten)]
    pub(crate) paths: ProjectPaths,

    #[clap(flatten)]
    pub(crate) selection: Selection,

    /// Output directory for the Postman collection and environment.
    #[clap(long, default_value = "postman/generated")]
    pub postman_dir: PathBuf,

    /// Upstream JSON method list (file or URL). Repeatable.
    #[clap(long)]
    pub upstream: Vec<String>,

    /// MMRPC 2.0 dispatcher source (file or URL). Repeatable.
    #[clap(long)]
    pub dispatcher: Vec<String>,

    /// Legacy dispatcher source (file or URL). Repeatable.
    #[clap(long)]
    pub legacy_dispatcher: Vec<String>,

    /// Write the JSON coverage report here; the text report is always printed.
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Compute everything, write nothing.
    #[clap(long)]
    pub dry_run: bool,
}

/// Executes the sync pipeline. Returns `false` when any method failed.
pub fn execute(args: &SyncArgs, config: &PipelineConfig, cancel: &Arc<AtomicBool>) -> AppResult<bool> {
    println!("Starting Sync Pipeline...");

    // 1. MDX -> OpenAPI
    let openapi_args = OpenApiArgs {
        paths: args.paths.clone(),
        selection: args.selection.clone(),
        dry_run: args.dry_run,
    };
    let summary = openapi::run(&openapi_args, config, cancel)?;
    if cancel.load(Ordering::SeqCst) {
        println!("Sync Pipeline interrupted; skipping Postman and coverage steps.");
        return Ok(false);
    }

    // 2. OpenAPI -> Postman
    if args.dry_run {
        let collection = build(&summary.items)?;
        println!(
            "Skipping Postman output (--dry-run); {} requests would be generated from this run.",
            collection.request_count()
        );
    } else {
        let items = load_path_items(&args.paths.paths_dir)?;
        write_collection(&items, &args.postman_dir)?;
    }

    // 3. Coverage
    let mut gap_args = GapAnalysisArgs {
        paths: args.paths.clone(),
        upstream: args.upstream.clone(),
        dispatcher: args.dispatcher.clone(),
        legacy_dispatcher: args.legacy_dispatcher.clone(),
        format: ReportFormat::Text,
        output: None,
        save_upstream: None,
        fail_on_gaps: false,
    };
    let emitted = args.dry_run.then(|| summary.emitted_catalog());
    let report = gap_analysis::build_report(&gap_args, config, emitted)?;
    gap_analysis::output_report(&gap_args, &report)?;
    if let Some(path) = &args.report {
        if args.dry_run {
            println!("Skipping report file {} (--dry-run).", path.display());
        } else {
            gap_args.format = ReportFormat::Json;
            gap_args.output = Some(path.clone());
            gap_analysis::output_report(&gap_args, &report)?;
        }
    }

    let ok = summary.is_success();
    println!(
        "Sync Pipeline {}.",
        if ok { "completed successfully" } else { "completed with failures" }
    );
    Ok(ok)
}
