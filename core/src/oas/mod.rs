#![deny(missing_docs)]

//! # OpenAPI Module
//!
//! - **models**: the emitted path item.
//! - **emitter**: ParsedDoc + component matches to path item.
//! - **merge**: folding a path item into an existing file.
//! - **validation**: minimal structural checks.
//! - **document**: YAML rendering and reading.
//! - **ref_utils**: `$ref` parsing.

pub mod document;
pub mod emitter;
pub mod merge;
pub mod models;
pub mod ref_utils;
pub mod validation;

pub use emitter::{emit, EmitContext};
pub use merge::merge_path_item;
pub use models::OpenApiPathItem;
