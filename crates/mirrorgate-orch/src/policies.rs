//! Per-operation retry bounds and fixed waits.
//!
//! One value object carries every magic number of the lifecycle so the
//! bounds are visible in one place and strippable in tests.

use mirrorgate_core::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Policies {
    /// Per-volume promote loop.
    pub volume_promote: RetryPolicy,
    /// Promote-peer / resync-peer handoff during demote and resync.
    pub peer_handoff: RetryPolicy,
    /// Parent/template image housekeeping.
    pub parent_image: RetryPolicy,
    /// Waiting for volumes to settle before a start / after a snapshot.
    pub volume_settle: RetryPolicy,
    /// Block after restarting the remote daemon service so it can rejoin.
    pub daemon_rejoin_wait: Duration,
    /// Trailing resync cool-down, serialized process-wide.
    pub resync_cooldown: Duration,
    /// Consecutive transport failures tolerated in the settle loop before
    /// breaking early instead of burning the full bound on a dead daemon.
    pub unavailable_break: u32,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            volume_promote: RetryPolicy::VOLUME_PROMOTE,
            peer_handoff: RetryPolicy::PEER_HANDOFF,
            parent_image: RetryPolicy::PARENT_IMAGE,
            volume_settle: RetryPolicy::VOLUME_SETTLE,
            daemon_rejoin_wait: Duration::from_secs(180),
            resync_cooldown: Duration::from_secs(300),
            unavailable_break: 5,
        }
    }
}

impl Policies {
    /// Same attempt bounds, zero waits. Tests keep the loop semantics
    /// without the wall-clock cost.
    pub fn immediate() -> Self {
        let d = Self::default();
        Self {
            volume_promote: d.volume_promote.with_interval(Duration::ZERO),
            peer_handoff: d.peer_handoff.with_interval(Duration::ZERO),
            parent_image: d.parent_image.with_interval(Duration::ZERO),
            volume_settle: d.volume_settle.with_interval(Duration::ZERO),
            daemon_rejoin_wait: Duration::ZERO,
            resync_cooldown: Duration::ZERO,
            unavailable_break: d.unavailable_break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_match_the_runbook() {
        let p = Policies::default();
        assert_eq!(p.volume_promote.max_attempts, 100);
        assert!(p.volume_promote.interval.is_zero());
        assert_eq!(p.peer_handoff.interval, Duration::from_secs(10));
        assert_eq!(p.parent_image.max_attempts, 20);
        assert_eq!(p.volume_settle.interval, Duration::from_secs(60));
        assert_eq!(p.daemon_rejoin_wait, Duration::from_secs(180));
        assert_eq!(p.resync_cooldown, Duration::from_secs(300));
    }

    #[test]
    fn immediate_keeps_bounds_drops_waits() {
        let p = Policies::immediate();
        assert_eq!(p.volume_promote.max_attempts, 100);
        assert_eq!(p.parent_image.max_attempts, 20);
        assert!(p.peer_handoff.interval.is_zero());
        assert!(p.resync_cooldown.is_zero());
    }
}
