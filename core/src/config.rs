#![deny(missing_docs)]

//! # Pipeline Configuration
//!
//! Tunables for every stage of the pipeline, loadable from TOML.
//! Every field has a default so an empty file (or no file) is valid.

use crate::error::{AppError, AppResult};
use crate::mdx::ParamLocation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Document parser heuristics.
    pub parser: ParserConfig,
    /// Schema matcher settings.
    pub matcher: MatcherConfig,
    /// OpenAPI emitter settings.
    pub emitter: EmitterConfig,
    /// Batch execution settings.
    pub run: RunConfig,
    /// Upstream fetch policy.
    pub upstream: UpstreamConfig,
}

/// Heuristics used when reading parameter tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Description keywords that mark a parameter as optional (case-insensitive).
    pub optional_keywords: Vec<String>,
    /// Keywords that hint at a default value. A row carrying one of these
    /// without an optional keyword is flagged for review.
    pub default_keywords: Vec<String>,
    /// Header synonyms identifying the explicit "required" column.
    pub required_columns: Vec<String>,
    /// Location assigned to top-level table parameters.
    pub default_location: ParamLocation,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            optional_keywords: vec!["optional".into()],
            default_keywords: vec!["defaults to".into(), "default:".into(), "default is".into()],
            required_columns: vec!["required".into(), "mandatory".into()],
            default_location: ParamLocation::Query,
        }
    }
}

/// Schema matcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum Jaccard similarity for a component match.
    pub threshold: f64,
    /// Prefix prepended to component file paths when building `$ref` strings.
    /// Relative to the emitted path files.
    pub ref_prefix: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            ref_prefix: "../../components/schemas/".into(),
        }
    }
}

/// OpenAPI emitter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Template for the path key. `{version}` and `{method}` are substituted.
    pub path_template: String,
    /// HTTP method used for every operation (KDF is POST-only).
    pub http_method: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            path_template: "/api/{version}/{method}".into(),
            http_method: "post".into(),
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of methods processed in parallel.
    pub concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Upstream fetch policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts before giving up.
    pub retries: u32,
    /// Base backoff in milliseconds, doubled after every failed attempt.
    pub backoff_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retries: 3,
            backoff_ms: 500,
        }
    }
}

impl UpstreamConfig {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        let config: PipelineConfig = toml::from_str(text)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the pipeline cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.matcher.threshold) {
            return Err(AppError::Config(format!(
                "matcher.threshold must be within [0, 1], got {}",
                self.matcher.threshold
            )));
        }
        if self.run.concurrency == 0 {
            return Err(AppError::Config("run.concurrency must be at least 1".into()));
        }
        if self.upstream.retries == 0 {
            return Err(AppError::Config("upstream.retries must be at least 1".into()));
        }
        if !self.emitter.path_template.contains("{method}") {
            return Err(AppError::Config(
                "emitter.path_template must contain '{method}'".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.matcher.threshold, 0.8);
        assert_eq!(cfg.parser.optional_keywords, vec!["optional".to_string()]);
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
[parser]
optional_keywords = ["optional", "may be omitted"]
default_location = "body"

[run]
concurrency = 8
"#;
        let cfg = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.parser.optional_keywords.len(), 2);
        assert_eq!(cfg.parser.default_location, ParamLocation::Body);
        assert_eq!(cfg.run.concurrency, 8);
        // untouched sections keep defaults
        assert_eq!(cfg.upstream.retries, 3);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = PipelineConfig::from_toml_str("[matcher]\nthreshold = 1.5\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(PipelineConfig::from_toml_str("[run]\nconcurrency = 0\n").is_err());
    }
}
