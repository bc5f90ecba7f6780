#![deny(missing_docs)]

//! # Component Schemas
//!
//! - `library`: loading the component schema directory.
//! - `matcher`: similarity matching of extracted shapes against it.

pub mod library;
pub mod matcher;

pub use library::{ComponentLibrary, ComponentRef};
pub use matcher::{SchemaMatcher, Shape};
