#![deny(missing_docs)]

//! # Postman Command
//!
//! Builds `collection.json` and `environment.json` from the emitted path specs.

use docgen_core::fs_utils::{write_atomic, WriteOutcome};
use docgen_core::postman::{build, build_environment, to_json_string};
use docgen_core::{load_path_items, AppResult, OpenApiPathItem};
use std::path::{Path, PathBuf};

/// Arguments for the postman command.
#[derive(clap::Args, Debug, Clone)]
pub struct PostmanArgs {
    /// Directory holding `<version>/<method>.yaml` path specs.
    #[clap(long, default_value = "openapi/paths")]
    pub paths_dir: PathBuf,

    /// Output directory for the collection and environment.
    #[clap(long, default_value = "postman/generated")]
    pub output_dir: PathBuf,
}

/// Writes the collection and environment for `items`.
pub fn write_collection(items: &[OpenApiPathItem], output_dir: &Path) -> AppResult<()> {
    let collection = build(items)?;
    let environment = build_environment();

    for (name, text) in [
        ("collection.json", to_json_string(&collection)?),
        ("environment.json", to_json_string(&environment)?),
    ] {
        let path = output_dir.join(name);
        match write_atomic(&path, &text)? {
            WriteOutcome::Written => println!("Wrote {}", path.display()),
            WriteOutcome::Unchanged => println!("Unchanged {}", path.display()),
        }
    }
    println!("Collection contains {} requests.", collection.request_count());
    Ok(())
}

/// Executes the command.
pub fn execute(args: &PostmanArgs) -> AppResult<bool> {
    let items = load_path_items(&args.paths_dir)?;
    tracing::info!(items = items.len(), "Building Postman collection");
    write_collection(&items, &args.output_dir)?;
    Ok(true)
}
