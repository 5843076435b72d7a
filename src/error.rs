//! Error taxonomy for indexing, syncing, and querying.
//!
//! Only [`LibrarianError::Config`] and [`LibrarianError::Connection`] are fatal
//! for a run. Everything else is recovered per file or per event and folded
//! into scan counters.

use std::path::PathBuf;

use crate::error_codes::*;

pub type Result<T, E = LibrarianError> = std::result::Result<T, E>;

/// Process exit code for a successful run (including runs with per-file failures)
pub const EXIT_OK: u8 = 0;
/// Fatal setup error that is neither configuration nor connection
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_CONNECTION: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum LibrarianError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error ({address}): {message}")]
    Connection { address: String, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("query failed: {0}")]
    Query(String),

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("webhook error: {0}")]
    Webhook(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LibrarianError {
    pub fn config(message: impl Into<String>) -> Self {
        LibrarianError::Config(message.into())
    }

    pub fn connection(address: impl Into<String>, message: impl std::fmt::Display) -> Self {
        LibrarianError::Connection {
            address: address.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LibrarianError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LibrarianError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether the error poisons the connection it happened on.
    ///
    /// Query errors leave the connection usable; I/O and protocol errors do not.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            LibrarianError::Connection { .. } | LibrarianError::Protocol(_) | LibrarianError::Io(_)
        )
    }

    /// Stable error code for JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            LibrarianError::Config(_) => LIB_CFG_001_INVALID_CONFIG,
            LibrarianError::Connection { .. } => LIB_CONN_001_UNREACHABLE,
            LibrarianError::Protocol(_) => LIB_CONN_002_PROTOCOL,
            LibrarianError::Parse { .. } => LIB_PRS_001_PARSE_FAILED,
            LibrarianError::Query(_) => LIB_QRY_001_QUERY_FAILED,
            LibrarianError::Filesystem { .. } | LibrarianError::Io(_) => LIB_FS_001_FILESYSTEM,
            LibrarianError::Webhook(_) => LIB_HOOK_001_WEBHOOK,
            LibrarianError::Json(_) => LIB_PRS_001_PARSE_FAILED,
        }
    }

    /// Process exit code when this error terminates a command.
    pub fn exit_code(&self) -> u8 {
        match self {
            LibrarianError::Config(_) => EXIT_CONFIG,
            LibrarianError::Connection { .. } | LibrarianError::Protocol(_) => EXIT_CONNECTION,
            _ => EXIT_FATAL,
        }
    }
}

/// Map an `anyhow` chain back to an exit code by looking for a typed cause.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<LibrarianError>())
        .map(LibrarianError::exit_code)
        .unwrap_or(EXIT_FATAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(LibrarianError::config("bad").exit_code(), EXIT_CONFIG);
        assert_eq!(
            LibrarianError::connection("127.0.0.1:6379", "refused").exit_code(),
            EXIT_CONNECTION
        );
        assert_eq!(LibrarianError::Query("x".into()).exit_code(), EXIT_FATAL);
    }

    #[test]
    fn exit_code_survives_anyhow_context() {
        let result: std::result::Result<(), LibrarianError> =
            Err(LibrarianError::config("missing graph name"));
        let err = result.context("loading config").unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CONFIG);
    }

    #[test]
    fn query_errors_keep_connection() {
        assert!(!LibrarianError::Query("syntax".into()).is_connection_fatal());
        assert!(LibrarianError::Protocol("junk".into()).is_connection_fatal());
    }
}
