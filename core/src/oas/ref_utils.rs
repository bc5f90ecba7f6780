#![deny(missing_docs)]

//! # Reference Utilities
//!
//! Splitting and classifying `$ref` strings found in path files, e.g.
//! `../../components/schemas/Common.yaml#/CoinTicker`.
//!
//! References are never fetched. Remote references are reported as such so
//! validation can flag them.

use percent_encoding::percent_decode_str;
use url::Url;

/// Where a reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `#/...` inside the same document.
    Local,
    /// Relative file path, optionally with a fragment.
    Relative,
    /// Absolute URL.
    Remote,
}

/// A `$ref` split into document and fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedReference<'a> {
    /// Classification.
    pub kind: ReferenceKind,
    /// Part before `#` (empty for local references).
    pub document: &'a str,
    /// Part after `#`, without the `#`.
    pub fragment: Option<&'a str>,
}

/// Splits a reference string.
pub fn parse_reference(reference: &str) -> ParsedReference<'_> {
    let (document, fragment) = match reference.split_once('#') {
        Some((doc, frag)) => (doc, Some(frag)),
        None => (reference, None),
    };
    let kind = if document.is_empty() {
        ReferenceKind::Local
    } else if Url::parse(document).is_ok() {
        ReferenceKind::Remote
    } else {
        ReferenceKind::Relative
    };
    ParsedReference {
        kind,
        document,
        fragment,
    }
}

/// Decodes a JSON Pointer segment (handles `~1`, `~0` and percent escapes).
pub fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded).decode_utf8_lossy().into_owned()
}
