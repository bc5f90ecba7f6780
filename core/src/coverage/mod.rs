#![deny(missing_docs)]

//! # Coverage / Gap Reporting
//!
//! - `catalog`: per-version method sets with optional field lists.
//! - `upstream`: fetching the upstream list with retry.
//! - `report`: the comparison itself and its renderings.

pub mod catalog;
pub mod report;
pub mod upstream;

pub use catalog::{CatalogField, MethodCatalog};
pub use report::{compare, CoverageReport, ReferenceSource, VersionCoverage};
pub use upstream::{fetch_dispatcher, fetch_with_retry, FileFetcher, UpstreamFetcher};
