#![deny(missing_docs)]

//! # KDF Docgen Core
//!
//! Core library for turning the KDF API documentation (MDX pages) into
//! OpenAPI path specs, Postman collections and coverage reports.

/// Shared error types.
pub mod error;

/// Pipeline configuration.
pub mod config;

/// Method manifest loading.
pub mod registry;

/// MDX page parsing.
pub mod mdx;

/// Type mapping logic (documented type -> JSON Schema).
pub mod type_mapping;

/// Component schema library and matching.
pub mod schemas;

/// OpenAPI emission, merge and validation.
pub mod oas;

/// Field-level diff calculation.
pub mod diff;

/// Coverage and gap reporting.
pub mod coverage;

/// Rust dispatcher source scanning.
pub mod parser;

/// Postman collection generation.
pub mod postman;

/// Atomic file output.
pub mod fs_utils;

/// Batch execution.
pub mod pipeline;

pub use config::PipelineConfig;
pub use coverage::{compare, CoverageReport, MethodCatalog, UpstreamFetcher};
pub use diff::{calculate_diff, FieldDiff};
pub use error::{AppError, AppResult};
pub use mdx::{parse as parse_mdx, ParsedDoc};
pub use oas::{emit, merge_path_item, EmitContext, OpenApiPathItem};
pub use parser::scan_dispatchers;
pub use pipeline::{documented_catalog, load_path_items, Pipeline, RunSummary};
pub use postman::{build as build_postman_collection, PostmanCollection};
pub use registry::{ApiVersion, MethodEntry, MethodRegistry};
pub use schemas::{ComponentLibrary, ComponentRef, SchemaMatcher};
pub use type_mapping::{DocTypeMapper, TypeMapper};
