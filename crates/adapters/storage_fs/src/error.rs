//! Storage-specific error type for the file-system repositories.

use std::path::{Path, PathBuf};

use cadence_domain::error::{CadenceError, ValidationError};

/// Errors originating from reading or writing automation files.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored document is not a valid automation (or automation map).
    #[error("invalid JSON in `{}`", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A stored automation parses but breaks an automation rule.
    #[error("invalid automation in `{}`", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("version marker `{}` does not hold an ISO-8601 timestamp", path.display())]
    Version {
        path: PathBuf,
        #[source]
        source: chrono::ParseError,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(path: &Path, source: ValidationError) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<StorageError> for CadenceError {
    fn from(err: StorageError) -> Self {
        Self::storage(err)
    }
}
