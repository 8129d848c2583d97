//! Error type for the glue daemon client.
//!
//! The daemon contract is deliberately coarse: transport errors and
//! non-success HTTP statuses both collapse to [`GlueError::Unavailable`],
//! so callers only ever decide "try the next candidate or give up".

use mirrorgate_core::DrError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GlueError {
    /// Daemon unreachable, timed out, answered non-2xx, or returned a body
    /// that could not be decoded. Never surfaced raw past this crate.
    #[error("glue daemon unavailable: {0}")]
    Unavailable(String),
}

impl GlueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<reqwest::Error> for GlueError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<GlueError> for DrError {
    fn from(e: GlueError) -> Self {
        match e {
            GlueError::Unavailable(msg) => DrError::Transport(msg),
        }
    }
}

/// Convenience alias.
pub type GlueResult<T> = Result<T, GlueError>;
