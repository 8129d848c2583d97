//! # MirrorGate – glue daemon client
//!
//! Stateless wrapper over the storage-mirroring daemon's HTTP control
//! surface (`https://<addr>:8080/api/v1`). One method per daemon
//! capability; every call either returns a decoded value or collapses to
//! "unavailable". Candidate iteration lives in the orchestrator, not here.
//!
//! ## Modules
//!
//! - **types** — typed replication status and health decoding
//! - **error** — `GlueError` / `GlueResult`
//! - **client** — the `GlueClient` HTTP surface

pub mod client;
pub mod error;
pub mod types;

pub use client::{GlueClient, PairSetupRequest};
pub use error::{GlueError, GlueResult};
pub use types::{
    Activity, GlueHealth, LocalRole, MirrorDaemonHealth, MirrorImageStatus, MirroredImage,
    MirroredImageList, PeerSiteStatus, ReplicationState,
};
