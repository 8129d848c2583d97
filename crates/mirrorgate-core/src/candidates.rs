//! First-success iteration over daemon candidate addresses.
//!
//! Every daemon call in the orchestrator follows the same contract: try
//! each candidate in resolver order, sequentially, and let the first
//! success win. Total failure collapses into a single transport error.
//! The combinator lives here so the pattern exists exactly once.

use crate::error::{DrError, DrResult};
use log::warn;
use std::future::Future;

/// Run `op` against each candidate in order, returning the first success.
///
/// Transport failures move on to the next candidate; any other error is
/// authoritative and aborts the iteration. An empty candidate list is a
/// hard failure for every operation that needs the daemon.
pub async fn try_each_until_success<'a, T, F, Fut>(
    candidates: &'a [String],
    mut op: F,
) -> DrResult<T>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = DrResult<T>>,
{
    if candidates.is_empty() {
        return Err(DrError::transport("no daemon candidates available"));
    }
    let mut last = None;
    for addr in candidates {
        match op(addr).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                warn!("daemon candidate {} failed: {}", addr, err);
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last.unwrap_or_else(|| DrError::transport("all daemon candidates failed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_list_is_a_hard_failure() {
        let out: DrResult<()> =
            try_each_until_success(&[], |_| async { Ok(()) }).await;
        assert!(matches!(out, Err(DrError::Transport(_))));
    }

    #[tokio::test]
    async fn first_success_wins_and_stops_iteration() {
        let tried = Mutex::new(Vec::new());
        let candidates = addrs(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let out = try_each_until_success(&candidates, |addr| {
            tried.lock().unwrap().push(addr.to_string());
            async move { Ok::<_, DrError>(addr.to_string()) }
        })
        .await;
        assert_eq!(out.unwrap(), "10.0.0.1");
        assert_eq!(tried.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timing_out_candidate_falls_through_to_next() {
        // Candidate X always times out, candidate Y always succeeds: the
        // call must succeed using only Y.
        let candidates = addrs(&["x.invalid", "y.valid"]);
        let out = try_each_until_success(&candidates, |addr| async move {
            if addr == "x.invalid" {
                Err(DrError::transport("connect timed out"))
            } else {
                Ok(addr.to_string())
            }
        })
        .await;
        assert_eq!(out.unwrap(), "y.valid");
    }

    #[tokio::test]
    async fn total_failure_reports_last_transport_error() {
        let candidates = addrs(&["a", "b"]);
        let out: DrResult<()> = try_each_until_success(&candidates, |addr| async move {
            Err(DrError::transport(format!("{} unreachable", addr)))
        })
        .await;
        match out {
            Err(DrError::Transport(msg)) => assert!(msg.contains("b")),
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_transport_error_is_authoritative() {
        let tried = Mutex::new(0u32);
        let candidates = addrs(&["a", "b"]);
        let out: DrResult<()> = try_each_until_success(&candidates, |_| {
            *tried.lock().unwrap() += 1;
            async { Err(DrError::guard("image not idle")) }
        })
        .await;
        assert!(matches!(out, Err(DrError::Guard(_))));
        assert_eq!(*tried.lock().unwrap(), 1);
    }
}
