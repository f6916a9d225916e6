//! File system manager error types.
//!
//! Expected outcomes (a file is locked, a directory is missing, ...) are
//! reported through the closed outcome enums in [`crate::types`]. `FsError`
//! covers only the failures a caller cannot map onto a fixed response.

use std::io;
use thiserror::Error;

use crate::types::SessionId;

/// File system manager error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// The session was never created or has already disconnected.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Path escapes root (only raised when confinement is enabled).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Whether the connection can keep serving requests after this error.
    ///
    /// I/O failures and vanished sessions end the connection; a rejected
    /// path is answered and the loop continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PathEscapesRoot(_))
    }
}

/// File system manager result type.
pub type FsResult<T> = Result<T, FsError>;
