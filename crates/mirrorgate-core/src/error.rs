//! Error taxonomy for disaster-recovery orchestration.
//!
//! Every fallible path in the workspace resolves to one of these variants:
//! transport problems are absorbed and retried across daemon candidates,
//! guard violations and validation errors fail fast without any retry, and
//! exhausted retry loops name the exact volume or image so an operator can
//! step in manually.

use thiserror::Error;

/// Top-level error type for all DR operations.
#[derive(Debug, Clone, Error)]
pub enum DrError {
    /// Daemon or peer endpoint unreachable, or it answered with a
    /// non-success status. Absorbed and retried across candidates where a
    /// candidate list exists; never surfaced raw from a client crate.
    #[error("remote endpoint unavailable: {0}")]
    Transport(String),

    /// A required precondition is not met (e.g. a mapped VM is still
    /// running, or a peer image is not idle). Raised immediately, no retry.
    #[error("guard violation: {0}")]
    Guard(String),

    /// A bounded retry loop completed without success. `subject` is the
    /// volume or image path the loop was driving.
    #[error("'{subject}' did not succeed within {attempts} attempts")]
    Exhausted { subject: String, attempts: u32 },

    /// The DR service feature flag is off. Raised before any remote call.
    #[error("disaster recovery service is disabled")]
    Disabled,

    /// Missing or invalid parameters, duplicate names, unknown ids.
    /// Raised before any remote interaction.
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// The registry backend failed to read or write a row.
    #[error("registry failure: {0}")]
    Registry(String),
}

impl DrError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn guard(msg: impl Into<String>) -> Self {
        Self::Guard(msg.into())
    }

    pub fn exhausted(subject: impl Into<String>, attempts: u32) -> Self {
        Self::Exhausted {
            subject: subject.into(),
            attempts,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Whether this error may be absorbed by trying the next daemon
    /// candidate or the next loop attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Convenience result alias used across the workspace.
pub type DrResult<T> = Result<T, DrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_names_the_subject() {
        let err = DrError::exhausted("rbd/vol-root-01", 100);
        let s = err.to_string();
        assert!(s.contains("rbd/vol-root-01"));
        assert!(s.contains("100"));
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(DrError::transport("timed out").is_retryable());
        assert!(!DrError::guard("vm running").is_retryable());
        assert!(!DrError::Disabled.is_retryable());
        assert!(!DrError::validation("no such cluster").is_retryable());
        assert!(!DrError::exhausted("img", 20).is_retryable());
    }
}
