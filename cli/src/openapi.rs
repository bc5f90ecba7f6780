#![deny(missing_docs)]

//! # OpenAPI Command
//!
//! Emits (and merges) one OpenAPI path spec per manifest method.

use crate::common::{ProjectPaths, Selection};
use docgen_core::{AppResult, Pipeline, PipelineConfig, RunSummary};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Arguments for the openapi command.
#[derive(clap::Args, Debug, Clone)]
pub struct OpenApiArgs {
    #[clap(flatten)]
    pub(crate) paths: ProjectPaths,

    #[clap(flatten)]
    pub(crate) selection: Selection,

    /// Report what would change without writing.
    #[clap(long)]
    pub dry_run: bool,
}

/// Runs the pipeline and prints its summary. Setting `cancel` stops the run
/// before the next method.
pub fn run(
    args: &OpenApiArgs,
    config: &PipelineConfig,
    cancel: &Arc<AtomicBool>,
) -> AppResult<RunSummary> {
    let registry = args.paths.load_registry(&args.selection)?;
    let library = args.paths.load_library(config)?;
    println!(
        "Emitting {} methods into {}{}",
        registry.len(),
        args.paths.paths_dir.display(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let summary = Pipeline::new(config, &library, &args.paths.docs_root, &args.paths.paths_dir)
        .with_dry_run(args.dry_run)
        .with_cancel_flag(Arc::clone(cancel))
        .run(&registry)?;
    print!("{}", summary.render_text());
    Ok(summary)
}

/// Executes the command. Returns `false` when any method failed.
pub fn execute(args: &OpenApiArgs, config: &PipelineConfig, cancel: &Arc<AtomicBool>) -> AppResult<bool> {
    Ok(run(args, config, cancel)?.is_success())
}
