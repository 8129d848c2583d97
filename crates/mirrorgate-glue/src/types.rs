//! Typed views of the daemon's replication status payloads.
//!
//! The daemon reports image status as loosely structured JSON
//! (`{ description, peer_sites: [{ state, description }] }`). It is
//! decoded exactly once here into enums; nothing outside this module does
//! string-contains checks on replication state.

use serde::{Deserialize, Serialize};

/// Whether the local copy of a mirrored image is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalRole {
    /// Local image is the writable primary.
    Primary,
    /// Local image is a secondary replica.
    NotPrimary,
    /// A force-promote is in flight; treated like primary by the promote
    /// guards because issuing another promote would be redundant.
    OrphanForcePromoting,
}

/// Replication state of one peer site, from the `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationState {
    Replaying,
    Error,
    Unknown,
    Down,
}

/// Replication activity of one peer site, from its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Converged; safe to boot or snapshot.
    Idle,
    /// Still catching up.
    Syncing,
}

/// Status of one peer site for a mirrored image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSiteStatus {
    pub state: ReplicationState,
    pub activity: Activity,
}

/// The single authoritative signal consulted before any promote, demote
/// or resync. Always derived fresh from the daemon, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorImageStatus {
    pub local: LocalRole,
    pub peers: Vec<PeerSiteStatus>,
}

impl MirrorImageStatus {
    /// Primary, or already being force-promoted.
    pub fn is_local_primary(&self) -> bool {
        matches!(
            self.local,
            LocalRole::Primary | LocalRole::OrphanForcePromoting
        )
    }

    /// Every peer idle: the image is converged on all sites.
    pub fn all_peers_idle(&self) -> bool {
        self.peers.iter().all(|p| p.activity == Activity::Idle)
    }

    /// Any peer reporting an error or down state.
    pub fn any_peer_unhealthy(&self) -> bool {
        self.peers
            .iter()
            .any(|p| matches!(p.state, ReplicationState::Error | ReplicationState::Down))
    }
}

#[derive(Debug, Deserialize)]
struct RawPeerSite {
    #[serde(default)]
    state: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawImageStatus {
    #[serde(default)]
    description: String,
    #[serde(default)]
    peer_sites: Vec<RawPeerSite>,
}

fn decode_local(description: &str) -> LocalRole {
    let d = description.to_ascii_lowercase();
    if d.contains("orphan") && d.contains("force promoting") {
        LocalRole::OrphanForcePromoting
    } else if d.contains("local image is primary") {
        LocalRole::Primary
    } else {
        LocalRole::NotPrimary
    }
}

fn decode_state(state: &str) -> ReplicationState {
    let s = state.to_ascii_lowercase();
    if s.starts_with("down") {
        ReplicationState::Down
    } else if s.contains("replaying") {
        ReplicationState::Replaying
    } else if s.contains("error") {
        ReplicationState::Error
    } else {
        ReplicationState::Unknown
    }
}

fn decode_activity(description: &str) -> Activity {
    if description.to_ascii_lowercase().contains("idle") {
        Activity::Idle
    } else {
        Activity::Syncing
    }
}

impl MirrorImageStatus {
    /// Decode the daemon's wire payload. Unrecognised fields degrade to
    /// `NotPrimary` / `Unknown` / `Syncing` rather than failing the call.
    pub fn from_wire(value: &serde_json::Value) -> Self {
        let raw: RawImageStatus =
            serde_json::from_value(value.clone()).unwrap_or(RawImageStatus {
                description: String::new(),
                peer_sites: Vec::new(),
            });
        Self {
            local: decode_local(&raw.description),
            peers: raw
                .peer_sites
                .iter()
                .map(|p| PeerSiteStatus {
                    state: decode_state(&p.state),
                    activity: decode_activity(&p.description),
                })
                .collect(),
        }
    }
}

// ── Health payloads ─────────────────────────────────────────────────────

/// `GET /glue` cluster health.
#[derive(Debug, Clone, Deserialize)]
pub struct GlueHealth {
    #[serde(default)]
    pub status: String,
}

impl GlueHealth {
    /// The original treats both OK and WARN as reachable-and-usable.
    pub fn is_usable(&self) -> bool {
        self.status.contains("HEALTH_OK") || self.status.contains("HEALTH_WARN")
    }
}

/// `GET /mirror` mirroring-daemon health summary.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorDaemonHealth {
    #[serde(default)]
    pub daemon_health: String,
    #[serde(default)]
    pub health: String,
    #[serde(default)]
    pub image_health: String,
    #[serde(default)]
    pub states: serde_json::Value,
}

// ── Mirrored image inventory ────────────────────────────────────────────

/// One snapshot-schedule entry on a mirrored image.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleItem {
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub start_time: String,
}

/// One mirrored image as reported by `GET /mirror/image/rbd`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirroredImage {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub pool: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub items: Vec<ScheduleItem>,
}

/// Local and remote halves of the mirrored-image inventory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MirroredImageList {
    #[serde(rename = "Local", default)]
    pub local: Vec<MirroredImage>,
    #[serde(rename = "Remote", default)]
    pub remote: Vec<MirroredImage>,
}

impl MirroredImageList {
    pub fn local_image_names(&self) -> Vec<&str> {
        self.local.iter().map(|i| i.image.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_local_primary() {
        let status = MirrorImageStatus::from_wire(&json!({
            "description": "local image is primary",
            "peer_sites": [{"state": "up+replaying", "description": "replaying, idle"}],
        }));
        assert_eq!(status.local, LocalRole::Primary);
        assert!(status.is_local_primary());
        assert_eq!(status.peers[0].state, ReplicationState::Replaying);
        assert_eq!(status.peers[0].activity, Activity::Idle);
        assert!(status.all_peers_idle());
    }

    #[test]
    fn decodes_orphan_force_promoting() {
        let status = MirrorImageStatus::from_wire(&json!({
            "description": "orphan (force promoting)",
            "peer_sites": [],
        }));
        assert_eq!(status.local, LocalRole::OrphanForcePromoting);
        assert!(status.is_local_primary());
    }

    #[test]
    fn decodes_secondary_with_syncing_peer() {
        let status = MirrorImageStatus::from_wire(&json!({
            "description": "replaying",
            "peer_sites": [{"state": "up+replaying", "description": "replaying, syncing 42%"}],
        }));
        assert_eq!(status.local, LocalRole::NotPrimary);
        assert!(!status.is_local_primary());
        assert!(!status.all_peers_idle());
    }

    #[test]
    fn decodes_down_and_error_peers() {
        let status = MirrorImageStatus::from_wire(&json!({
            "description": "local image is primary",
            "peer_sites": [
                {"state": "down+unknown", "description": ""},
                {"state": "up+error", "description": "split-brain detected"},
            ],
        }));
        assert_eq!(status.peers[0].state, ReplicationState::Down);
        assert_eq!(status.peers[1].state, ReplicationState::Error);
        assert!(status.any_peer_unhealthy());
    }

    #[test]
    fn malformed_payload_degrades_to_unknown() {
        let status = MirrorImageStatus::from_wire(&json!("not an object"));
        assert_eq!(status.local, LocalRole::NotPrimary);
        assert!(status.peers.is_empty());
    }

    #[test]
    fn glue_health_usable_states() {
        assert!(GlueHealth { status: "HEALTH_OK".into() }.is_usable());
        assert!(GlueHealth { status: "HEALTH_WARN".into() }.is_usable());
        assert!(!GlueHealth { status: "HEALTH_ERR".into() }.is_usable());
    }

    #[test]
    fn image_list_decodes_both_sides() {
        let list: MirroredImageList = serde_json::from_value(json!({
            "Local": [{"image": "vol-1", "pool": "rbd", "namespace": "", "items": [{"interval": "1h", "start_time": ""}]}],
            "Remote": [{"image": "vol-1", "pool": "rbd", "namespace": "", "items": []}],
        }))
        .unwrap();
        assert_eq!(list.local_image_names(), vec!["vol-1"]);
        assert_eq!(list.remote.len(), 1);
    }
}
