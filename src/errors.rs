//! Error taxonomy for the parser service.
//!
//! The six semantic kinds from the design (archive, parse, query, stream,
//! timeout, session-closed) are one `thiserror` enum so the session server
//! and CLI can convert any of them into the `{ok, message, line, col,
//! exit_code}` response shape in one place.

use serde::Serialize;
use thiserror::Error;

/// The parser's error taxonomy.
///
/// Every variant carries enough context to build a protocol error frame
/// (`message`, optional `line`/`col`, optional `exit_code`) without the
/// caller re-deriving it.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Invalid container, or a required member (`meta`/`gamestate`) missing.
    #[error("archive error: {message}")]
    Archive { message: String },

    /// Unrecoverable structural problem in the decoded text.
    #[error("parse error at {line}:{col}: {message}")]
    Parse {
        message: String,
        line: usize,
        col: usize,
    },

    /// Well-formed request, invalid arguments (unknown op, missing field).
    #[error("query error: {message}")]
    Query { message: String },

    /// Streaming protocol violation (overlapping iteration, frame out of order).
    #[error("stream error: {message}")]
    Stream { message: String },

    /// Raised only by the client bridge when a receive exceeds its deadline.
    #[error("timeout after {elapsed_ms}ms waiting for response")]
    Timeout { elapsed_ms: u64 },

    /// Use of a session after `close` (or after the child process exited).
    #[error("session is closed")]
    SessionClosed,

    /// Bridge-side: the binary could not be located or the process could
    /// not be spawned.
    #[error("bridge error: {message}")]
    Bridge { message: String },
}

impl ParserError {
    pub fn archive(message: impl Into<String>) -> Self {
        ParserError::Archive {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>, line: usize, col: usize) -> Self {
        ParserError::Parse {
            message: message.into(),
            line,
            col,
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        ParserError::Query {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        ParserError::Stream {
            message: message.into(),
        }
    }

    /// Exit code per the session server's lifecycle (0 normal, 1 file not
    /// found, 2 parse error, 3 invalid arguments). Non-fatal kinds have no
    /// process exit code and return `None`.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ParserError::Archive { .. } => Some(1),
            ParserError::Parse { .. } => Some(2),
            _ => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ParserError::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn col(&self) -> Option<usize> {
        match self {
            ParserError::Parse { col, .. } => Some(*col),
            _ => None,
        }
    }
}

/// The wire shape of an error response: `{ok: false, message, line?, col?,
/// exit_code?}` per spec section 6.1.
#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl From<&ParserError> for ErrorFrame {
    fn from(err: &ParserError) -> Self {
        ErrorFrame {
            ok: false,
            message: err.to_string(),
            line: err.line(),
            col: err.col(),
            exit_code: err.exit_code(),
        }
    }
}
