//! Typed rows and job handles for peer API responses.

use serde::{Deserialize, Serialize};

/// Handle to an asynchronous peer job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef(pub String);

impl JobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminality of a polled job: 0 pending, 1 success, 2 failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Failure,
}

impl JobStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Success,
            2 => Self::Failure,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One `queryAsyncJobResult` poll.
#[derive(Debug, Clone)]
pub struct JobPoll {
    pub status: JobStatus,
    pub result: serde_json::Value,
    pub error_text: Option<String>,
}

/// A DR registration row as the peer reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRegistration {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "drclusterstatus")]
    pub status: String,
    #[serde(default, rename = "mirroringagentstatus")]
    pub agent_status: String,
}

/// A virtual machine row as the peer (or the local management API,
/// queried through the same client) reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerVm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

impl PeerVm {
    pub fn is_stopped(&self) -> bool {
        self.state.eq_ignore_ascii_case("stopped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_codes() {
        assert_eq!(JobStatus::from_code(0), JobStatus::Pending);
        assert_eq!(JobStatus::from_code(1), JobStatus::Success);
        assert_eq!(JobStatus::from_code(2), JobStatus::Failure);
        assert_eq!(JobStatus::from_code(99), JobStatus::Pending);
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
    }

    #[test]
    fn stopped_check_is_case_insensitive() {
        let vm = PeerVm {
            id: "vm-1".into(),
            name: "web".into(),
            state: "Stopped".into(),
        };
        assert!(vm.is_stopped());
        let vm = PeerVm { state: "Running".into(), ..vm };
        assert!(!vm.is_stopped());
    }
}
