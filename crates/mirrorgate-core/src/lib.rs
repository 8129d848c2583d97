//! # MirrorGate – shared kernel
//!
//! Building blocks used by every other MirrorGate crate:
//!
//! - **error** — the `DrError` taxonomy and `DrResult` alias
//! - **retry** — bounded `RetryPolicy` loops with fixed intervals
//! - **candidates** — the single first-success combinator over daemon
//!   candidate addresses
//! - **resolver** — `DaemonEndpointResolver` and its implementations

pub mod candidates;
pub mod error;
pub mod resolver;
pub mod retry;

pub use candidates::try_each_until_success;
pub use error::{DrError, DrResult};
pub use resolver::{DaemonEndpointResolver, HostsFileResolver, StaticResolver};
pub use retry::RetryPolicy;
