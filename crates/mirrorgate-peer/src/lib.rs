//! # MirrorGate – peer control-plane client
//!
//! Signed query-string RPC against the remote cluster's management API:
//! DR registration CRUD, resource listing, volume provisioning, VM
//! start/stop, and asynchronous job polling. Requests are authenticated
//! with an HMAC-SHA256 signature over the canonicalised query.
//!
//! ## Modules
//!
//! - **signing** — canonical query + signature construction
//! - **types** — job references, job status codes, typed list rows
//! - **client** — `PeerClient`, one method per peer command
//! - **jobs** — fixed-interval async job polling

pub mod client;
pub mod error;
pub mod jobs;
pub mod signing;
pub mod types;

pub use client::PeerClient;
pub use error::{PeerError, PeerResult};
pub use jobs::{await_job, await_job_bounded, JOB_POLL_INTERVAL};
pub use types::{JobPoll, JobRef, JobStatus, PeerRegistration, PeerVm};
