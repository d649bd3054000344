//! Error types for the IMAP server engine.

use thiserror::Error;

/// Errors that can occur while serving a connection.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command syntax error.
    ///
    /// Syntax errors are per-command: the dispatcher answers the offending
    /// command with a tagged `BAD` and the connection stays open.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Protocol violation that terminates the connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates a parse error at the given scan position.
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
