use std::path::PathBuf;

use serde::Deserialize;

use super::range::TextRange;

/// One result from a static-analysis report, before it becomes a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFinding {
    pub uri: PathBuf,
    pub range: TextRange,
    pub text: String,
    pub tool: String,
}

/// Neutral on-disk finding record accepted by `secnotes import`.
///
/// Lines are 1-based as printed by analysis tools; `uri` may be absolute or
/// relative to the workspace root.
#[derive(Debug, Clone, Deserialize)]
pub struct FindingRecord {
    pub uri: String,
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "endLine", default)]
    pub end_line: Option<u32>,
    pub text: String,
    #[serde(default)]
    pub tool: Option<String>,
}

impl FindingRecord {
    /// Resolve against the workspace; `default_tool` names findings without a tool
    pub fn into_finding(self, root: &std::path::Path, default_tool: &str) -> ToolFinding {
        let start = self.start_line.saturating_sub(1);
        let end = self.end_line.unwrap_or(self.start_line).saturating_sub(1);
        let path = PathBuf::from(&self.uri);
        let uri = if path.is_absolute() { path } else { root.join(path) };
        ToolFinding {
            uri,
            range: TextRange::lines(start, end.max(start)),
            text: self.text,
            tool: self.tool.unwrap_or_else(|| default_tool.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_record_into_finding() {
        let rec: FindingRecord = serde_json::from_str(
            r#"{"uri": "src/db.py", "startLine": 10, "endLine": 12, "text": "SQL built from input", "tool": "bandit"}"#,
        )
        .unwrap();
        let f = rec.into_finding(Path::new("/work"), "import");
        assert_eq!(f.uri, Path::new("/work/src/db.py"));
        assert_eq!(f.range, TextRange::lines(9, 11));
        assert_eq!(f.tool, "bandit");
    }

    #[test]
    fn test_record_defaults() {
        let rec: FindingRecord =
            serde_json::from_str(r#"{"uri": "/abs/x.go", "startLine": 3, "text": "G104"}"#).unwrap();
        let f = rec.into_finding(Path::new("/work"), "gosec");
        assert_eq!(f.uri, Path::new("/abs/x.go"));
        assert_eq!(f.range, TextRange::lines(2, 2));
        assert_eq!(f.tool, "gosec");
    }
}
