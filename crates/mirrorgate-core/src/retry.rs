//! Bounded retry loops with fixed inter-attempt intervals.
//!
//! Each lifecycle operation drives its remote calls through a
//! [`RetryPolicy`] instead of an inline counter, so the bound and the
//! sleep are visible at the call site and overridable in tests.

use crate::error::{DrError, DrResult};
use log::debug;
use std::future::Future;
use std::time::Duration;

/// A bounded retry loop: up to `max_attempts` tries with a fixed `interval`
/// sleep between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    /// Per-volume promote loop: hammer the daemon without sleeping.
    pub const VOLUME_PROMOTE: RetryPolicy = RetryPolicy {
        max_attempts: 100,
        interval: Duration::ZERO,
    };

    /// Promote-peer / resync-peer handoff during demote and resync.
    pub const PEER_HANDOFF: RetryPolicy = RetryPolicy {
        max_attempts: 100,
        interval: Duration::from_secs(10),
    };

    /// Parent/template image housekeeping after the volume loops.
    pub const PARENT_IMAGE: RetryPolicy = RetryPolicy {
        max_attempts: 20,
        interval: Duration::from_secs(10),
    };

    /// Waiting for every volume of a VM to settle into a consistent
    /// replication state before a start or after a snapshot.
    pub const VOLUME_SETTLE: RetryPolicy = RetryPolicy {
        max_attempts: 100,
        interval: Duration::from_secs(60),
    };

    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Same bound, different sleep. Used by tests to strip the fixed
    /// intervals without touching the attempt counts.
    pub const fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    /// Drive `op` until it succeeds or the bound is exhausted.
    ///
    /// Transport failures are absorbed and retried; any other error aborts
    /// the loop immediately. Exhaustion reports `subject` so the operator
    /// knows which volume or image needs manual intervention.
    pub async fn run<T, F, Fut>(&self, subject: &str, mut op: F) -> DrResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DrResult<T>>,
    {
        let mut last: Option<DrError> = None;
        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    debug!(
                        "attempt {}/{} for '{}' failed: {}",
                        attempt, self.max_attempts, subject, err
                    );
                    last = Some(err);
                    if attempt < self.max_attempts && !self.interval.is_zero() {
                        tokio::time::sleep(self.interval).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        let _ = last;
        Err(DrError::exhausted(subject, self.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let out = policy.run("img", |_| async { Ok::<_, DrError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_transport_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(10, Duration::ZERO);
        let out = policy
            .run("img", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 4 {
                        Err(DrError::transport("still down"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(100, Duration::ZERO);
        let out: DrResult<()> = policy
            .run("rbd/vol-a", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DrError::transport("never up")) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 100);
        match out {
            Err(DrError::Exhausted { subject, attempts }) => {
                assert_eq!(subject, "rbd/vol-a");
                assert_eq!(attempts, 100);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn guard_violation_aborts_without_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(50, Duration::ZERO);
        let out: DrResult<()> = policy
            .run("img", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DrError::guard("vm still running")) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(out, Err(DrError::Guard(_))));
    }

    #[test]
    fn documented_bounds() {
        assert_eq!(RetryPolicy::VOLUME_PROMOTE.max_attempts, 100);
        assert!(RetryPolicy::VOLUME_PROMOTE.interval.is_zero());
        assert_eq!(RetryPolicy::PEER_HANDOFF.max_attempts, 100);
        assert_eq!(RetryPolicy::PEER_HANDOFF.interval, Duration::from_secs(10));
        assert_eq!(RetryPolicy::PARENT_IMAGE.max_attempts, 20);
        assert_eq!(RetryPolicy::VOLUME_SETTLE.interval, Duration::from_secs(60));
    }
}
