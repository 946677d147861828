use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use docqa_core::types::{Chunk, ChunkKind, FusedCandidate};

pub const TABLE_MARKDOWN_KEY: &str = "table_markdown";

static TIMESTAMP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}(?::\d{2})?[.,]\d{3}\s*-->\s*\d{2}:\d{2}(?::\d{2})?[.,]\d{3}").ok());

/// Chunk text with subtitle timestamps removed and whitespace collapsed.
pub fn clean_text(text: &str) -> String {
    let stripped = match TIMESTAMP.as_ref() {
        Some(re) => re.replace_all(text, " "),
        None => text.into(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Label like `text - page 3`, or just the kind when the page is unknown.
pub fn source_label(chunk: &Chunk) -> String {
    match chunk.source_page {
        Some(page) => format!("{} - page {page}", chunk.kind.label()),
        None => chunk.kind.label().to_string(),
    }
}

/// Numbered context block; entry `i` (1-based) is candidate `i - 1`.
pub fn format_context(candidates: &[FusedCandidate]) -> String {
    let mut out = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let chunk = &candidate.chunk;
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{}] [{}] {}", i + 1, source_label(chunk), clean_text(&chunk.text));
        if chunk.kind == ChunkKind::TableSummary {
            if let Some(table) = chunk.metadata.get(TABLE_MARKDOWN_KEY) {
                let _ = write!(out, "\n{table}");
            }
        }
    }
    out
}
