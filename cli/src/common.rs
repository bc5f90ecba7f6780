//! # Shared Arguments
//!
//! Input locations and method selection reused by several subcommands.

use docgen_core::{ApiVersion, AppResult, ComponentLibrary, MethodRegistry, PipelineConfig};
use std::path::PathBuf;

/// Where the inputs and outputs live.
#[derive(clap::Args, Debug, Clone)]
pub struct ProjectPaths {
    /// Method manifest (`method_pages.json`).
    #[clap(long, env = "KDF_DOCGEN_MANIFEST", default_value = "data/method_pages.json")]
    pub manifest: PathBuf,

    /// Directory the manifest's MDX paths are relative to.
    #[clap(long, env = "KDF_DOCGEN_DOCS_ROOT", default_value = ".")]
    pub docs_root: PathBuf,

    /// Component schema directory.
    #[clap(long, default_value = "openapi/components/schemas")]
    pub components: PathBuf,

    /// Output directory for `<version>/<method>.yaml` path specs.
    #[clap(long, default_value = "openapi/paths")]
    pub paths_dir: PathBuf,
}

impl ProjectPaths {
    /// Loads the manifest and applies the selection.
    pub fn load_registry(&self, selection: &Selection) -> AppResult<MethodRegistry> {
        let registry = MethodRegistry::load_file(&self.manifest)?;
        Ok(registry.filtered(selection.api_version, selection.method.as_deref()))
    }

    /// Loads the component library; a missing directory yields an empty one.
    pub fn load_library(&self, config: &PipelineConfig) -> AppResult<ComponentLibrary> {
        if !self.components.is_dir() {
            tracing::warn!(
                dir = %self.components.display(),
                "Component directory not found, every schema will be inlined"
            );
            return Ok(ComponentLibrary::default());
        }
        let library = ComponentLibrary::load(&self.components, &config.matcher.ref_prefix)?;
        tracing::info!(components = library.len(), "Loaded component library");
        Ok(library)
    }
}

/// Restricts a run to part of the manifest.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Selection {
    /// Only this API version (v1 or v2).
    #[clap(long, value_parser = parse_version)]
    pub api_version: Option<ApiVersion>,

    /// Only this method.
    #[clap(long)]
    pub method: Option<String>,
}

fn parse_version(s: &str) -> Result<ApiVersion, String> {
    ApiVersion::parse(s).ok_or_else(|| format!("unknown API version `{}` (expected v1 or v2)", s))
}
