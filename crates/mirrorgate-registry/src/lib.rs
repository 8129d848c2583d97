//! # MirrorGate – DR registry
//!
//! Persistent view of the disaster-recovery topology: paired clusters,
//! per-volume VM mirror mappings, and the free-form attribute bag each
//! cluster carries (peer keys, mirror schedule interval, private key
//! material). Storage sits behind the async [`DrRegistry`] trait; the
//! in-memory [`MemoryRegistry`] is the reference implementation.
//!
//! ## Modules
//!
//! - **cluster** — `DrCluster`, roles, statuses, interval grammar
//! - **vm_map** — `VmMirrorMapping`, volume kinds, mirror volume status
//! - **store** — `DrRegistry` trait + `MemoryRegistry`

pub mod cluster;
pub mod store;
pub mod vm_map;

pub use cluster::{
    parse_mirror_interval, AgentStatus, ClusterRole, ClusterStatus, DrCluster,
};
pub use store::{DrRegistry, MemoryRegistry};
pub use vm_map::{MirrorVolumeStatus, VmMirrorMapping, VolumeKind};
