//! # MirrorGate – DR lifecycle orchestrator
//!
//! Sequences the mirror daemon and the peer management API through the
//! full disaster-recovery lifecycle: pairing setup, pool enable/disable,
//! promote, demote, resync, clear, and the per-VM mirror operations.
//! Every remote interaction is a bounded-retry sequence over freshly
//! resolved daemon candidates, guarded by registry state and by the
//! daemon's own replication status.
//!
//! ## Modules
//!
//! - **traits** — `MirrorDaemon` / `PeerControlPlane` injection seams
//! - **adapters** — HTTP implementations over the client crates
//! - **keyfile** — scoped single-use private-key file
//! - **policies** — per-operation retry bounds and fixed waits
//! - **service** — `Orchestrator`, cluster registry ops, health probes
//! - **cluster** — cluster-level lifecycle operations
//! - **vm** — per-VM mirror operations

pub mod adapters;
pub mod cluster;
pub mod keyfile;
pub mod policies;
pub mod service;
pub mod traits;
pub mod vm;

pub use adapters::{HttpMirrorDaemon, HttpPeerControlPlane};
pub use keyfile::ScopedKeyFile;
pub use policies::Policies;
pub use service::Orchestrator;
pub use traits::{MirrorDaemon, PeerControlPlane, PeerEndpoint};
pub use vm::{CreateMirrorVmRequest, MirrorVolumeSpec};
