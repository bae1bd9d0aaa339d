//! CLI error types.

use recstore_core::StoreError;
use recstore_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs `--path`.
    #[error("store path required for {command}")]
    PathRequired {
        /// Subcommand name.
        command: &'static str,
    },

    /// The directory holds no store.
    #[error("no store found at {}", path.display())]
    NoStore {
        /// Directory that was probed.
        path: PathBuf,
    },

    /// The store has no journal file.
    #[error("log file not found at {}", path.display())]
    LogNotFound {
        /// Expected journal path.
        path: PathBuf,
    },

    /// The requested record is absent.
    #[error("record {recid} not found")]
    RecordNotFound {
        /// Raw recid.
        recid: u64,
    },

    /// The requested name is not bound.
    #[error("named root {name:?} not found")]
    NamedRootNotFound {
        /// Root name.
        name: String,
    },

    /// Verification found problems.
    #[error("verification failed with {problems} problem(s)")]
    VerificationFailed {
        /// Number of problems found.
        problems: usize,
    },

    /// Error from the store engine.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error from the storage layer.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON output failed.
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = CliError::PathRequired { command: "inspect" };
        assert_eq!(err.to_string(), "store path required for inspect");

        let err = CliError::RecordNotFound { recid: 2541 };
        assert_eq!(err.to_string(), "record 2541 not found");

        let err = CliError::from(StoreError::Closed);
        assert!(matches!(err, CliError::Store(StoreError::Closed)));
    }
}
