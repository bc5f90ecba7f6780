#![deny(missing_docs)]

//! # Parser Module
//!
//! Handles parsing of Rust source code using the rust-analyzer syntax library.
//! Used to introspect KDF's RPC dispatchers as an upstream method list.

pub mod dispatcher;

pub use dispatcher::{scan_dispatchers, DispatcherRule, V1_RULES, V2_RULES};
