//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.

use crate::mdx::ParsedDoc;
use crate::registry::ApiVersion;
use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// A required structural marker is missing from an MDX document.
    ///
    /// Carries whatever could still be extracted so the caller can degrade.
    #[from(ignore)]
    #[display("Malformed document: missing {missing}")]
    MalformedDocument {
        /// Which marker was absent (e.g. `title export`).
        missing: String,
        /// The partially parsed document.
        partial: Box<ParsedDoc>,
    },

    /// The same method name appears twice within one API version.
    #[from(ignore)]
    #[display("Duplicate method name '{method}' in {version}")]
    DuplicateMethodName {
        /// Version the collision happened in.
        version: ApiVersion,
        /// The repeated method name.
        method: String,
    },

    /// Two path items share an operationId within one API version.
    #[from(ignore)]
    #[display("Duplicate operationId '{operation_id}' in {version}")]
    DuplicateOperationId {
        /// Version the collision happened in.
        version: ApiVersion,
        /// The repeated operationId.
        operation_id: String,
    },

    /// The method manifest could not be parsed.
    #[from(ignore)]
    #[display("Manifest Error: {_0}")]
    ManifestParse(String),

    /// More than one component schema matched a shape equally well.
    #[from(ignore)]
    #[display("Ambiguous schema match between {}", candidates.join(", "))]
    SchemaMatchAmbiguous {
        /// Names of the tied components.
        candidates: Vec<String>,
    },

    /// An upstream method list could not be retrieved.
    #[from(ignore)]
    #[display("Upstream fetch failed for '{source_name}' after {attempts} attempt(s): {reason}")]
    UpstreamFetch {
        /// File path or URL that was requested.
        source_name: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure reason.
        reason: String,
    },

    /// Writing an output file failed.
    #[from(ignore)]
    #[display("Failed to write '{path}': {reason}")]
    FileWrite {
        /// Target path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Configuration could not be loaded.
    #[from(ignore)]
    #[display("Config Error: {_0}")]
    Config(String),

    /// Generated output failed structural validation.
    #[from(ignore)]
    #[display("Invalid Output: {_0}")]
    InvalidOutput(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

impl AppError {
    /// Stable identifier of the error kind, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Io(_) => "Io",
            AppError::MalformedDocument { .. } => "MalformedDocument",
            AppError::DuplicateMethodName { .. } => "DuplicateMethodName",
            AppError::DuplicateOperationId { .. } => "DuplicateOperationId",
            AppError::ManifestParse(_) => "ManifestParseError",
            AppError::SchemaMatchAmbiguous { .. } => "SchemaMatchAmbiguous",
            AppError::UpstreamFetch { .. } => "UpstreamFetchError",
            AppError::FileWrite { .. } => "FileWriteError",
            AppError::Config(_) => "ConfigError",
            AppError::InvalidOutput(_) => "InvalidOutput",
            AppError::General(_) => "General",
        }
    }

    /// Whether the error must abort the whole run rather than a single method.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::DuplicateMethodName { .. }
                | AppError::DuplicateOperationId { .. }
                | AppError::ManifestParse(_)
                | AppError::Config(_)
        )
    }
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert_eq!(app_err.kind(), "Io");
    }

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_duplicate_method_display() {
        let err = AppError::DuplicateMethodName {
            version: ApiVersion::V1,
            method: "enable_bch".into(),
        };
        assert_eq!(
            format!("{}", err),
            "Duplicate method name 'enable_bch' in v1"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ambiguous_is_not_fatal() {
        let err = AppError::SchemaMatchAmbiguous {
            candidates: vec!["CoinA".into(), "CoinB".into()],
        };
        assert!(!err.is_fatal());
        assert_eq!(
            format!("{}", err),
            "Ambiguous schema match between CoinA, CoinB"
        );
    }
}
