//! # Block Scanner
//!
//! Splits MDX text into coarse blocks: headings, fenced code, tables,
//! export statements and everything else. Unknown markup (JSX components,
//! callouts, collapsibles) is never an error; it is kept as opaque text.

use regex::Regex;
use std::sync::OnceLock;

/// A coarse MDX block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Block {
    /// `#`..`######` heading.
    Heading { level: usize, text: String },
    /// Fenced code block with the headings and JSX labels that enclose it.
    Code {
        lang: String,
        body: String,
        context: Vec<String>,
    },
    /// Consecutive `|`-prefixed lines, with the enclosing headings.
    Table {
        lines: Vec<String>,
        context: Vec<String>,
    },
    /// `export const <name> = "<value>"`.
    Export { name: String, value: String },
    /// Paragraph of prose or opaque markup.
    Text(String),
}

fn export_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)^\s*export\s+const\s+(\w+)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|`([^`]*)`)"#)
            .expect("static regex")
    })
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*?)\s*#*\s*$").expect("static regex"))
}

fn jsx_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(?:title|label|expandedText|collapsedText)\s*=\s*["']([^"']+)["']"#)
            .expect("static regex")
    })
}

/// Matches a complete export statement at the start of `text`.
pub(crate) fn parse_export(text: &str) -> Option<(String, String)> {
    let caps = export_regex().captures(text)?;
    let name = caps.get(1)?.as_str().to_string();
    let value = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map(|m| m.as_str().replace("\\\"", "\"").replace("\\'", "'"))
        .unwrap_or_default();
    Some((name, value))
}

/// Strips `{#anchor}` / `{{label: ...}}` suffixes and escapes from heading text.
pub(crate) fn clean_heading(text: &str) -> String {
    let without_attrs = match text.find('{') {
        Some(idx) => &text[..idx],
        None => text,
    };
    without_attrs
        .replace("\\_", "_")
        .replace('`', "")
        .trim()
        .to_string()
}

/// Scans MDX text into blocks.
pub(crate) fn scan_blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut headings: Vec<(usize, String)> = Vec::new();
    let mut jsx_label: Option<String> = None;
    let mut paragraph: Vec<String> = Vec::new();
    let mut i = 0;

    let context_of = |headings: &[(usize, String)], jsx: &Option<String>| -> Vec<String> {
        let mut ctx: Vec<String> = headings.iter().map(|(_, t)| t.clone()).collect();
        if let Some(label) = jsx {
            ctx.push(label.clone());
        }
        ctx
    };

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();

        // Fenced code
        if let Some(fence) = fence_marker(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let indent = line.len() - trimmed.len();
            let lang = trimmed[fence.len()..]
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            let mut body_lines = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(fence) {
                body_lines.push(dedent(lines[i], indent));
                i += 1;
            }
            // skip closing fence (absent when the block runs to EOF)
            i += 1;
            blocks.push(Block::Code {
                lang,
                body: body_lines.join("\n"),
                context: context_of(&headings, &jsx_label),
            });
            continue;
        }

        // Export statements may span several lines
        if trimmed.starts_with("export ") {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut statement = String::from(line);
            let mut consumed = 1;
            while parse_export(&statement).is_none() && i + consumed < lines.len() && consumed < 8 {
                statement.push('\n');
                statement.push_str(lines[i + consumed]);
                consumed += 1;
            }
            match parse_export(&statement) {
                Some((name, value)) => {
                    blocks.push(Block::Export { name, value });
                    i += consumed;
                }
                None => {
                    // not a string export (e.g. `export default`), keep as opaque text
                    blocks.push(Block::Text(line.trim().to_string()));
                    i += 1;
                }
            }
            continue;
        }

        if trimmed.starts_with("import ") {
            flush_paragraph(&mut paragraph, &mut blocks);
            i += 1;
            continue;
        }

        if let Some(caps) = heading_regex().captures(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let level = caps[1].len();
            let text = clean_heading(&caps[2]);
            headings.retain(|(l, _)| *l < level);
            headings.push((level, text.clone()));
            jsx_label = None;
            blocks.push(Block::Heading { level, text });
            i += 1;
            continue;
        }

        if trimmed.starts_with('|') {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut table = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with('|') {
                table.push(lines[i].trim().to_string());
                i += 1;
            }
            blocks.push(Block::Table {
                lines: table,
                context: context_of(&headings, &jsx_label),
            });
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            i += 1;
            continue;
        }

        if trimmed.starts_with('<') {
            if let Some(caps) = jsx_label_regex().captures(trimmed) {
                jsx_label = Some(caps[1].to_string());
            } else if trimmed.starts_with("</CodeGroup") || trimmed.starts_with("</CollapsibleSection") {
                jsx_label = None;
            }
        }

        paragraph.push(line.trim().to_string());
        i += 1;
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Removes up to `indent` leading whitespace characters.
fn dedent(line: &str, indent: usize) -> String {
    let strip = line
        .chars()
        .take(indent)
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum::<usize>();
    line[strip..].to_string()
}

fn flush_paragraph(paragraph: &mut Vec<String>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Text(paragraph.join("\n")));
        paragraph.clear();
    }
}
