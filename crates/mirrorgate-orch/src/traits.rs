//! Injection seams for the two remote systems.
//!
//! The orchestrator never talks HTTP directly; it drives these traits.
//! Production wires them to the client crates (see `adapters`), tests
//! script them. Daemon methods take the candidate address per call
//! because the candidate list is re-resolved at every operation.

use async_trait::async_trait;
use mirrorgate_core::DrResult;
use mirrorgate_glue::{MirrorDaemonHealth, MirrorImageStatus, MirroredImageList, PairSetupRequest};
use mirrorgate_peer::{PeerRegistration, PeerVm};
use serde_json::Value;

/// One peer (or local) management API endpoint with its key pair.
#[derive(Clone)]
pub struct PeerEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for PeerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Storage-mirroring daemon control surface, one candidate address at a
/// time. Errors are always `DrError::Transport` so the candidate
/// combinator can fall through.
#[async_trait]
pub trait MirrorDaemon: Send + Sync {
    async fn health_usable(&self, addr: &str) -> DrResult<bool>;
    async fn mirror_health(&self, addr: &str) -> DrResult<MirrorDaemonHealth>;
    async fn pair_setup(
        &self,
        addr: &str,
        req: &PairSetupRequest,
        private_key: Vec<u8>,
    ) -> DrResult<()>;
    async fn pair_update(&self, addr: &str, interval: &str, host: &str) -> DrResult<()>;
    async fn pair_remove(&self, addr: &str, host: &str) -> DrResult<()>;
    async fn pool_mirror_enable(&self, addr: &str) -> DrResult<()>;
    async fn pool_mirror_disable(&self, addr: &str) -> DrResult<()>;
    async fn pool_garbage_collect(&self, addr: &str) -> DrResult<()>;
    async fn list_mirrored_images(&self, addr: &str) -> DrResult<MirroredImageList>;
    async fn image_status(&self, addr: &str, image: &str) -> DrResult<MirrorImageStatus>;
    async fn image_mirror_enable(
        &self,
        addr: &str,
        image: &str,
        interval: &str,
        start_time: Option<&str>,
    ) -> DrResult<()>;
    async fn image_delete(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_promote(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_promote_peer(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_demote(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_demote_peer(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_resync(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_resync_peer(&self, addr: &str, image: &str) -> DrResult<()>;
    async fn image_snapshot(&self, addr: &str, vm_name: &str, images: &[String]) -> DrResult<()>;
    async fn restart_daemon_service(&self, addr: &str, service: &str) -> DrResult<()>;
}

/// Peer management API, job-complete semantics: methods that map to
/// asynchronous peer commands poll the job to its terminal status before
/// returning.
#[async_trait]
pub trait PeerControlPlane: Send + Sync {
    async fn scvm_addresses(&self, ep: &PeerEndpoint) -> DrResult<Vec<String>>;
    async fn create_dr_registration(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<()>;
    async fn update_dr_registration(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<()>;
    async fn delete_dr_registration(&self, ep: &PeerEndpoint, id: &str) -> DrResult<()>;
    async fn list_dr_registrations(&self, ep: &PeerEndpoint) -> DrResult<Vec<PeerRegistration>>;
    async fn delete_dr_vm_record(&self, ep: &PeerEndpoint, vm_id: &str) -> DrResult<()>;
    async fn list_virtual_machines(
        &self,
        ep: &PeerEndpoint,
        name: Option<&str>,
    ) -> DrResult<Vec<PeerVm>>;
    async fn list_resources(
        &self,
        ep: &PeerEndpoint,
        command: &str,
        filters: &[(String, String)],
    ) -> DrResult<Value>;
    /// Returns the job result document (carries the new volume id).
    async fn create_volume(&self, ep: &PeerEndpoint, params: &[(String, String)])
        -> DrResult<Value>;
    async fn update_volume(&self, ep: &PeerEndpoint, params: &[(String, String)]) -> DrResult<()>;
    async fn attach_volume(&self, ep: &PeerEndpoint, params: &[(String, String)]) -> DrResult<()>;
    /// Returns the job result document (carries the placeholder VM id).
    async fn deploy_vm_for_volume(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<Value>;
    async fn start_vm(&self, ep: &PeerEndpoint, vm_id: &str) -> DrResult<()>;
    async fn stop_vm(&self, ep: &PeerEndpoint, vm_id: &str) -> DrResult<()>;
}
