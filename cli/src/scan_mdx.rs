#![deny(missing_docs)]

//! # Scan MDX Command
//!
//! Parses every page listed in the manifest and reports what was extracted,
//! without emitting anything. Optionally dumps the parsed documents as JSON.

use crate::common::{ProjectPaths, Selection};
use docgen_core::fs_utils::write_atomic;
use docgen_core::mdx;
use docgen_core::type_mapping::DocTypeMapper;
use docgen_core::{ApiVersion, AppError, AppResult, ParsedDoc, PipelineConfig};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Arguments for the scan-mdx command.
#[derive(clap::Args, Debug, Clone)]
pub struct ScanMdxArgs {
    #[clap(flatten)]
    pub(crate) paths: ProjectPaths,

    #[clap(flatten)]
    pub(crate) selection: Selection,

    /// Write parsed documents as JSON to this file.
    #[clap(long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScannedPage {
    version: ApiVersion,
    method: String,
    mdx_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<ParsedDoc>,
}

/// Executes the scan. Returns `false` when any page failed to parse cleanly.
pub fn execute(args: &ScanMdxArgs, config: &PipelineConfig) -> AppResult<bool> {
    let registry = args.paths.load_registry(&args.selection)?;
    let mapper = DocTypeMapper;
    let mut pages = Vec::new();
    let mut failed = 0;

    for entry in registry.iter() {
        let path = entry.resolve_mdx(&args.paths.docs_root);
        let parsed = fs::read_to_string(&path)
            .map_err(|e| AppError::General(format!("Failed to read {}: {}", path.display(), e)))
            .and_then(|text| mdx::parse_with(&text, &config.parser, &mapper));

        let (doc, error) = match parsed {
            Ok(doc) => (Some(doc), None),
            Err(AppError::MalformedDocument { missing, partial }) => {
                (Some(*partial), Some(format!("malformed: missing {}", missing)))
            }
            Err(e) => (None, Some(e.to_string())),
        };

        match (&doc, &error) {
            (Some(doc), None) => println!(
                "{} {}: {} params, {} examples, {} review flags",
                entry.version,
                entry.method_name,
                doc.parameters.len(),
                doc.examples.len(),
                doc.review_flags.len()
            ),
            (_, Some(error)) => {
                failed += 1;
                println!("{} {}: FAILED ({})", entry.version, entry.method_name, error);
            }
            (None, None) => {}
        }

        pages.push(ScannedPage {
            version: entry.version,
            method: entry.method_name.clone(),
            mdx_path: entry.mdx_path.clone(),
            error,
            doc,
        });
    }

    println!("Scanned {} pages, {} failed.", pages.len(), failed);

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&pages)
            .map_err(|e| AppError::General(format!("Failed to serialize scan results: {}", e)))?;
        write_atomic(output, &format!("{}\n", json))?;
        println!("Scan results written to {}", output.display());
    }

    Ok(failed == 0)
}
