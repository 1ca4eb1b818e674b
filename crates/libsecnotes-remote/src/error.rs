//! Shared-store error types

use std::path::PathBuf;

use libsecnotes_core::SecNotesError;
use thiserror::Error;

/// Errors from the shared notes table
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Database could not be opened or created
    #[error("Failed to open database {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    /// Table could not be opened or created
    #[error("Failed to open table '{table}': {source}")]
    CreateTable {
        table: String,
        #[source]
        source: sled::Error,
    },

    /// Insert of a row that already exists
    #[error("Row '{0}' already exists")]
    Duplicate(String),

    /// Change feed ended because the database was closed
    #[error("Change feed closed")]
    FeedClosed,

    #[error("Storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RemoteError> for SecNotesError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Duplicate(_) => SecNotesError::Conflict(e.to_string()),
            other => SecNotesError::Remote(other.to_string()),
        }
    }
}
