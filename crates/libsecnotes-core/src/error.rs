use thiserror::Error;

/// Main error type for security-notes operations
#[derive(Debug, Error)]
pub enum SecNotesError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("file busy: {0}")]
    Busy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("remote store error: {0}")]
    Remote(String),
}

impl SecNotesError {
    /// Error code used in the JSON output envelope
    pub fn error_code(&self) -> &'static str {
        match self {
            SecNotesError::InvalidArgs(_) => "invalid_args",
            SecNotesError::NotFound(_) => "not_found",
            SecNotesError::Conflict(_) => "conflict",
            SecNotesError::Busy(_) => "db_busy",
            SecNotesError::Io(_) => "io_error",
            SecNotesError::Json(_) => "parse_error",
            SecNotesError::TomlParse(_) => "invalid_args",
            SecNotesError::TomlSerialize(_) => "internal_error",
            SecNotesError::Remote(_) => "remote_error",
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            SecNotesError::InvalidArgs(_) => 2,
            SecNotesError::NotFound(_) => 3,
            SecNotesError::Conflict(_) => 4,
            SecNotesError::Busy(_) => 4,
            SecNotesError::Io(_) => 5,
            SecNotesError::TomlParse(_) => 2,
            SecNotesError::Remote(_) => 6,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            SecNotesError::NotFound(msg) => {
                if msg.starts_with("Note") {
                    vec!["Run 'secnotes note list' to see available notes"]
                } else if msg.starts_with("Trail") {
                    vec!["Run 'secnotes trail list' to see available trails"]
                } else if msg.starts_with("Comment") {
                    vec!["Run 'secnotes note show <id>' to see comment ids"]
                } else {
                    vec![]
                }
            }
            SecNotesError::Busy(_) => vec![
                "Another secnotes process is writing; retry in a moment",
            ],
            SecNotesError::Remote(_) => vec![
                "Check [collab] database and project_name in .security-notes/config.toml",
                "Or disable collaboration with 'enabled = false' and retry",
            ],
            SecNotesError::TomlParse(_) => vec![
                "Fix .security-notes/config.toml or remove it to restore defaults",
            ],
            _ => vec![],
        }
    }

    /// Create a NotFound error for a note thread
    pub fn note_not_found(thread_id: &str) -> Self {
        SecNotesError::NotFound(format!("Note '{}' not found", short_id(thread_id)))
    }

    /// Create a NotFound error for a breadcrumb trail
    pub fn trail_not_found(trail_id: &str) -> Self {
        SecNotesError::NotFound(format!("Trail '{}' not found", short_id(trail_id)))
    }

    /// Create a NotFound error for a comment or crumb inside a parent
    pub fn comment_not_found(comment_id: &str) -> Self {
        SecNotesError::NotFound(format!("Comment '{}' not found", short_id(comment_id)))
    }
}

fn short_id(id: &str) -> &str {
    id.get(..16).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_truncates_long_ids() {
        let err = SecNotesError::note_not_found("0123456789abcdef0123456789abcdef");
        assert_eq!(err.to_string(), "not found: Note '0123456789abcdef' not found");
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.suggestions(),
            vec!["Run 'secnotes note list' to see available notes"]
        );
    }

    #[test]
    fn test_invalid_input_errors_exit_with_usage_code() {
        let args = SecNotesError::InvalidArgs("bad range".to_string());
        assert_eq!(args.error_code(), "invalid_args");
        assert_eq!(args.exit_code(), 2);

        let toml_err = toml::from_str::<toml::Table>("author = ").unwrap_err();
        let config = SecNotesError::from(toml_err);
        assert_eq!(config.error_code(), "invalid_args");
        assert_eq!(config.exit_code(), 2);
        assert_eq!(config.suggestions().len(), 1);
    }

    #[test]
    fn test_remote_error_code() {
        let err = SecNotesError::Remote("connection refused".to_string());
        assert_eq!(err.error_code(), "remote_error");
        assert_eq!(err.exit_code(), 6);
    }
}
