#![deny(missing_docs)]

//! # Postman Collection Generator
//!
//! - `models`: serde types for collections and environments.
//! - `builder`: folding path items into those types.

pub mod builder;
pub mod models;

pub use builder::{build, build_environment, stable_id, to_json_string, Category};
pub use models::{PostmanCollection, PostmanEnvironment, PostmanItem, RequestItem};
