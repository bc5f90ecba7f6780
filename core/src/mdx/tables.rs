//! # Table Reader
//!
//! Recognizes markdown tables whose header names a field column, a type
//! column and a description column (in any order) and turns their rows into
//! raw cells.

use crate::config::ParserConfig;
use regex::Regex;
use std::sync::OnceLock;

const NAME_SYNONYMS: &[&str] = &["parameter", "parameters", "param", "structure", "name", "field", "key"];
const TYPE_SYNONYMS: &[&str] = &["type", "datatype"];
const DESCRIPTION_SYNONYMS: &[&str] = &["description", "desc", "details", "notes"];

/// Column layout of a recognized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableColumns {
    pub name: usize,
    pub kind: usize,
    pub description: usize,
    pub required: Option<usize>,
}

/// Cells of one data row, already cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawRow {
    pub name: String,
    pub raw_type: String,
    pub description: String,
    pub required_cell: Option<String>,
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("static regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("static regex"))
}

/// Splits a `| a | b |` row into trimmed cells. Escaped pipes stay in the cell.
pub(crate) fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Strips backticks, markdown links, inline tags, emphasis and `\_` escapes.
pub(crate) fn clean_cell(cell: &str) -> String {
    let text = link_regex().replace_all(cell, "$1");
    let text = tag_regex().replace_all(&text, " ");
    let text = text
        .replace('`', "")
        .replace("\\_", "_")
        .replace("**", "")
        .replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans a description cell. Links become their text but backticks stay,
/// since they delimit enum values.
pub(crate) fn clean_description(cell: &str) -> String {
    let text = link_regex().replace_all(cell, "$1");
    let text = tag_regex().replace_all(&text, " ");
    let text = text.replace("\\_", "_").replace("**", "").replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, alphanumerics only.
fn normalize_header(cell: &str) -> String {
    clean_cell(cell)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| {
            let t = c.trim();
            !t.is_empty() && t.contains('-') && t.chars().all(|ch| matches!(ch, '-' | ':' | ' '))
        })
}

fn find_column(headers: &[String], synonyms: &[&str], taken: &[usize]) -> Option<usize> {
    let candidates = || headers.iter().enumerate().filter(|(i, _)| !taken.contains(i));
    candidates()
        .find(|(_, h)| synonyms.iter().any(|s| h.as_str() == *s))
        .or_else(|| candidates().find(|(_, h)| synonyms.iter().any(|s| h.starts_with(s))))
        .map(|(i, _)| i)
}

/// Identifies the column layout from a header row.
pub(crate) fn detect_columns(header: &[String], config: &ParserConfig) -> Option<TableColumns> {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    let required_synonyms: Vec<String> = config
        .required_columns
        .iter()
        .map(|s| normalize_header(s))
        .collect();
    let required_refs: Vec<&str> = required_synonyms.iter().map(String::as_str).collect();

    let required = find_column(&normalized, &required_refs, &[]);
    let mut taken: Vec<usize> = required.into_iter().collect();

    let kind = find_column(&normalized, TYPE_SYNONYMS, &taken)?;
    taken.push(kind);
    let description = find_column(&normalized, DESCRIPTION_SYNONYMS, &taken)?;
    taken.push(description);
    let name = find_column(&normalized, NAME_SYNONYMS, &taken)?;

    Some(TableColumns {
        name,
        kind,
        description,
        required,
    })
}

/// Reads a table's data rows. Returns `None` when the header is not a
/// field table.
pub(crate) fn read_table(lines: &[String], config: &ParserConfig) -> Option<Vec<RawRow>> {
    let header = split_row(lines.first()?);
    let columns = detect_columns(&header, config)?;

    let rows = lines
        .iter()
        .skip(1)
        .map(|l| split_row(l))
        .filter(|cells| !is_separator(cells))
        .filter_map(|cells| {
            let name = clean_cell(cells.get(columns.name)?);
            if name.is_empty() {
                return None;
            }
            Some(RawRow {
                name,
                raw_type: cells.get(columns.kind).map(|c| clean_cell(c)).unwrap_or_default(),
                description: cells
                    .get(columns.description)
                    .map(|c| clean_description(c))
                    .unwrap_or_default(),
                required_cell: columns
                    .required
                    .and_then(|i| cells.get(i))
                    .map(|c| clean_cell(c)),
            })
        })
        .collect();
    Some(rows)
}

/// Outcome of deciding whether a row is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequiredDecision {
    pub required: bool,
    pub ambiguous: bool,
}

/// Decides required-ness from an explicit column cell or the description.
pub(crate) fn decide_required(row: &RawRow, config: &ParserConfig) -> RequiredDecision {
    let heuristic = required_from_description(&row.description, config);

    let Some(cell) = row.required_cell.as_deref() else {
        return heuristic;
    };
    match cell.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "required" | "mandatory" | "x" | "✓" | "✔" | "✅" => RequiredDecision {
            required: true,
            ambiguous: false,
        },
        "no" | "n" | "false" | "optional" | "-" | "✗" | "❌" => RequiredDecision {
            required: false,
            ambiguous: false,
        },
        _ => RequiredDecision {
            ambiguous: true,
            ..heuristic
        },
    }
}

fn required_from_description(description: &str, config: &ParserConfig) -> RequiredDecision {
    let lower = description.to_lowercase();
    let contains_any = |keywords: &[String]| keywords.iter().any(|k| lower.contains(&k.to_lowercase()));

    let has_optional = contains_any(&config.optional_keywords);
    let has_default = contains_any(&config.default_keywords);
    let mentions_required = lower.contains("required");

    RequiredDecision {
        required: !has_optional,
        ambiguous: (!has_optional && has_default) || (has_optional && mentions_required),
    }
}
