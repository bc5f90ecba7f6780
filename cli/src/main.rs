#![deny(missing_docs)]

//! # KDF Docgen CLI
//!
//! Command Line Interface for the KDF documentation pipeline.
//!
//! Supported Commands:
//! - `scan-mdx`: Parses the manifest's MDX pages and reports what was extracted.
//! - `openapi`: MDX -> OpenAPI path specs (merged with existing files).
//! - `gap-analysis`: Manifest vs specs vs upstream method list.
//! - `postman`: OpenAPI path specs -> Postman collection + environment.
//! - `sync-bidirectional`: All of the above in one run.

use clap::{Parser, Subcommand};
use docgen_core::{AppResult, PipelineConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod common;
mod fetch;
mod gap_analysis;
mod interrupt;
mod openapi;
mod postman;
mod scan_mdx;
mod sync;

#[derive(Parser, Debug)]
#[clap(name = "kdf-docgen", author, version, about = "KDF API documentation toolchain")]
struct Cli {
    /// Pipeline configuration (TOML).
    #[clap(long, global = true, env = "KDF_DOCGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Override `run.concurrency`.
    #[clap(long, global = true)]
    concurrency: Option<usize>,

    /// Override `matcher.threshold`.
    #[clap(long, global = true)]
    threshold: Option<f64>,

    /// Debug logging (ignored when RUST_LOG is set).
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse MDX pages and report extracted parameters, examples and flags.
    ScanMdx(scan_mdx::ScanMdxArgs),
    /// Emit OpenAPI path specs from the MDX pages.
    #[clap(name = "openapi")]
    OpenApi(openapi::OpenApiArgs),
    /// Compare documented methods with emitted specs and upstream lists.
    GapAnalysis(gap_analysis::GapAnalysisArgs),
    /// Build the Postman collection from emitted path specs.
    Postman(postman::PostmanArgs),
    /// Run MDX -> OpenAPI -> Postman -> coverage in one go.
    SyncBidirectional(sync::SyncArgs),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Loads the config file (if any) and applies flag overrides.
fn load_config(cli: &Cli) -> AppResult<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config");
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(concurrency) = cli.concurrency {
        config.run.concurrency = concurrency;
    }
    if let Some(threshold) = cli.threshold {
        config.matcher.threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, cancel: &Arc<AtomicBool>) -> AppResult<bool> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::ScanMdx(args) => scan_mdx::execute(args, &config),
        Commands::OpenApi(args) => openapi::execute(args, &config, cancel),
        Commands::GapAnalysis(args) => gap_analysis::execute(args, &config),
        Commands::Postman(args) => postman::execute(args),
        Commands::SyncBidirectional(args) => sync::execute(args, &config, cancel),
    }
}

fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cancel = interrupt::install();

    match run(&cli, &cancel) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(kind = e.kind(), fatal = e.is_fatal(), "{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_overrides() {
        let cli = Cli::parse_from(["kdf-docgen", "--concurrency", "2", "--threshold", "0.5", "postman"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.run.concurrency, 2);
        assert_eq!(config.matcher.threshold, 0.5);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::parse_from(["kdf-docgen", "--concurrency", "0", "postman"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_subcommand_names() {
        let names: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["scan-mdx", "openapi", "gap-analysis", "postman", "sync-bidirectional"]
        );
    }
}
