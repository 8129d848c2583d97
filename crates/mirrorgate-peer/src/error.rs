//! Error type for the peer control-plane client.

use mirrorgate_core::DrError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PeerError {
    /// Peer unreachable, non-success status, or a null/absent/garbled
    /// response body.
    #[error("peer control plane unavailable: {0}")]
    Transport(String),

    /// An asynchronous job resolved to the failure status.
    #[error("peer job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
}

impl PeerError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn job_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JobFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for PeerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<PeerError> for DrError {
    fn from(e: PeerError) -> Self {
        DrError::Transport(e.to_string())
    }
}

/// Convenience alias.
pub type PeerResult<T> = Result<T, PeerError>;
