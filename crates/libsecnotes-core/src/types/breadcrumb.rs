use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::range::TextRange;

/// One recorded code location within a trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: String,
    pub trail_id: String,
    /// Absolute path of the file the snippet was taken from
    pub uri: PathBuf,
    pub range: TextRange,
    /// Source text captured when the crumb was recorded
    pub snippet: String,
    pub note: Option<String>,
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A named, ordered sequence of crumbs. Crumb order is the vector order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trail {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub crumbs: Vec<Crumb>,
}

/// Snapshot of the whole breadcrumb store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreadcrumbState {
    pub active_trail_id: Option<String>,
    pub trails: Vec<Trail>,
}

/// `L12` or `L12-L20`, 1-based
pub fn format_range_label(range: &TextRange) -> String {
    let start = range.start.line + 1;
    let end = range.end.line + 1;
    if start == end {
        format!("L{}", start)
    } else {
        format!("L{}-L{}", start, end)
    }
}

/// First non-empty line of a snippet, truncated to `max_len` characters
pub fn snippet_preview(snippet: &str, max_len: usize) -> String {
    let trimmed = snippet.trim();
    if trimmed.is_empty() {
        return "(empty selection)".to_string();
    }
    let first = trimmed.lines().next().unwrap_or("").trim();
    if first.chars().count() > max_len {
        let keep: String = first.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", keep)
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_range_label() {
        assert_eq!(format_range_label(&TextRange::lines(4, 4)), "L5");
        assert_eq!(format_range_label(&TextRange::lines(4, 9)), "L5-L10");
    }

    #[test]
    fn test_snippet_preview() {
        assert_eq!(snippet_preview("   \n  ", 80), "(empty selection)");
        assert_eq!(snippet_preview("  let x = 1;\nlet y = 2;", 80), "let x = 1;");
        assert_eq!(snippet_preview("abcdefghij", 8), "abcde...");
    }
}
