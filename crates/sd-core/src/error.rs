//! Base error type shared by configuration and loaders.

use thiserror::Error;

use crate::RequestKind;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid {kind} config: {reason}")]
    InvalidKind { kind: RequestKind, reason: String },

    #[error("unknown request kind {0:?}")]
    UnknownKind(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `sd-core`.
pub type CoreResult<T> = Result<T, CoreError>;
