//! Error types and exit codes for querysync

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for querysync operations
///
/// Note that a failed query compile is *not* an error: the compiler
/// collaborator reports its own failures and the engine treats the cycle as
/// a no-op (see [`crate::schema::CompileResult`]). The variants here cover
/// the setup and I/O failures that are surfaced to the CLI.
#[derive(Error, Debug)]
pub enum QuerySyncError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuerySyncError {
    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: File not found / IO error
    /// - 2: Watcher setup failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound { .. } => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(1),
            Self::Watch(_) => ExitCode::from(2),
        }
    }
}

/// Result type alias for querysync operations
pub type Result<T> = std::result::Result<T, QuerySyncError>;
