//! Production wiring of the injection seams onto the client crates.
//!
//! `HttpMirrorDaemon` builds a fresh `GlueClient` per (call, address) so
//! candidate iteration stays stateless; `HttpPeerControlPlane` builds a
//! `PeerClient` per endpoint and resolves asynchronous jobs before
//! returning.

use crate::traits::{MirrorDaemon, PeerControlPlane, PeerEndpoint};
use async_trait::async_trait;
use mirrorgate_core::{DrError, DrResult};
use mirrorgate_glue::{
    GlueClient, MirrorDaemonHealth, MirrorImageStatus, MirroredImageList, PairSetupRequest,
};
use mirrorgate_peer::{await_job, PeerClient, PeerRegistration, PeerVm};
use serde_json::Value;

/// Stateless daemon dispatch: one client per call.
#[derive(Default)]
pub struct HttpMirrorDaemon;

impl HttpMirrorDaemon {
    pub fn new() -> Self {
        Self
    }

    fn client(addr: &str) -> DrResult<GlueClient> {
        GlueClient::new(addr).map_err(DrError::from)
    }
}

#[async_trait]
impl MirrorDaemon for HttpMirrorDaemon {
    async fn health_usable(&self, addr: &str) -> DrResult<bool> {
        Ok(Self::client(addr)?.health().await?.is_usable())
    }

    async fn mirror_health(&self, addr: &str) -> DrResult<MirrorDaemonHealth> {
        Ok(Self::client(addr)?.mirror_health().await?)
    }

    async fn pair_setup(
        &self,
        addr: &str,
        req: &PairSetupRequest,
        private_key: Vec<u8>,
    ) -> DrResult<()> {
        Ok(Self::client(addr)?.pair_setup(req, private_key).await?)
    }

    async fn pair_update(&self, addr: &str, interval: &str, host: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.pair_update(interval, host).await?)
    }

    async fn pair_remove(&self, addr: &str, host: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.pair_remove(host).await?)
    }

    async fn pool_mirror_enable(&self, addr: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.pool_mirror_enable().await?)
    }

    async fn pool_mirror_disable(&self, addr: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.pool_mirror_disable().await?)
    }

    async fn pool_garbage_collect(&self, addr: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.pool_garbage_collect().await?)
    }

    async fn list_mirrored_images(&self, addr: &str) -> DrResult<MirroredImageList> {
        Ok(Self::client(addr)?.list_mirrored_images().await?)
    }

    async fn image_status(&self, addr: &str, image: &str) -> DrResult<MirrorImageStatus> {
        Ok(Self::client(addr)?.image_status(image).await?)
    }

    async fn image_mirror_enable(
        &self,
        addr: &str,
        image: &str,
        interval: &str,
        start_time: Option<&str>,
    ) -> DrResult<()> {
        Ok(Self::client(addr)?
            .image_mirror_enable(image, interval, start_time)
            .await?)
    }

    async fn image_delete(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_delete(image).await?)
    }

    async fn image_promote(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_promote(image).await?)
    }

    async fn image_promote_peer(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_promote_peer(image).await?)
    }

    async fn image_demote(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_demote(image).await?)
    }

    async fn image_demote_peer(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_demote_peer(image).await?)
    }

    async fn image_resync(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_resync(image).await?)
    }

    async fn image_resync_peer(&self, addr: &str, image: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.image_resync_peer(image).await?)
    }

    async fn image_snapshot(&self, addr: &str, vm_name: &str, images: &[String]) -> DrResult<()> {
        Ok(Self::client(addr)?.image_snapshot(vm_name, images).await?)
    }

    async fn restart_daemon_service(&self, addr: &str, service: &str) -> DrResult<()> {
        Ok(Self::client(addr)?.restart_daemon_service(service).await?)
    }
}

/// Signed RPC dispatch with job resolution folded in.
#[derive(Default)]
pub struct HttpPeerControlPlane;

impl HttpPeerControlPlane {
    pub fn new() -> Self {
        Self
    }

    fn client(ep: &PeerEndpoint) -> DrResult<PeerClient> {
        PeerClient::new(&ep.base_url, &ep.api_key, &ep.secret_key).map_err(DrError::from)
    }
}

#[async_trait]
impl PeerControlPlane for HttpPeerControlPlane {
    async fn scvm_addresses(&self, ep: &PeerEndpoint) -> DrResult<Vec<String>> {
        Ok(Self::client(ep)?.list_scvm_addresses().await?)
    }

    async fn create_dr_registration(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<()> {
        let client = Self::client(ep)?;
        if let Some(job) = client.create_dr_registration(params).await? {
            await_job(&client, &job).await?;
        }
        Ok(())
    }

    async fn update_dr_registration(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<()> {
        Ok(Self::client(ep)?.update_dr_registration(params).await?)
    }

    async fn delete_dr_registration(&self, ep: &PeerEndpoint, id: &str) -> DrResult<()> {
        Ok(Self::client(ep)?.delete_dr_registration(id).await?)
    }

    async fn list_dr_registrations(&self, ep: &PeerEndpoint) -> DrResult<Vec<PeerRegistration>> {
        Ok(Self::client(ep)?.list_dr_registrations().await?)
    }

    async fn delete_dr_vm_record(&self, ep: &PeerEndpoint, vm_id: &str) -> DrResult<()> {
        Ok(Self::client(ep)?.delete_dr_vm_record(vm_id).await?)
    }

    async fn list_virtual_machines(
        &self,
        ep: &PeerEndpoint,
        name: Option<&str>,
    ) -> DrResult<Vec<PeerVm>> {
        Ok(Self::client(ep)?.list_virtual_machines(name).await?)
    }

    async fn list_resources(
        &self,
        ep: &PeerEndpoint,
        command: &str,
        filters: &[(String, String)],
    ) -> DrResult<Value> {
        Ok(Self::client(ep)?.list_resources(command, filters).await?)
    }

    async fn create_volume(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<Value> {
        let client = Self::client(ep)?;
        let job = client.create_volume(params).await?;
        Ok(await_job(&client, &job).await?)
    }

    async fn update_volume(&self, ep: &PeerEndpoint, params: &[(String, String)]) -> DrResult<()> {
        let client = Self::client(ep)?;
        let job = client.update_volume(params).await?;
        await_job(&client, &job).await?;
        Ok(())
    }

    async fn attach_volume(&self, ep: &PeerEndpoint, params: &[(String, String)]) -> DrResult<()> {
        let client = Self::client(ep)?;
        let job = client.attach_volume(params).await?;
        await_job(&client, &job).await?;
        Ok(())
    }

    async fn deploy_vm_for_volume(
        &self,
        ep: &PeerEndpoint,
        params: &[(String, String)],
    ) -> DrResult<Value> {
        let client = Self::client(ep)?;
        let job = client.deploy_vm_for_volume(params).await?;
        Ok(await_job(&client, &job).await?)
    }

    async fn start_vm(&self, ep: &PeerEndpoint, vm_id: &str) -> DrResult<()> {
        let client = Self::client(ep)?;
        let job = client.start_vm(vm_id).await?;
        await_job(&client, &job).await?;
        Ok(())
    }

    async fn stop_vm(&self, ep: &PeerEndpoint, vm_id: &str) -> DrResult<()> {
        let client = Self::client(ep)?;
        let job = client.stop_vm(vm_id).await?;
        await_job(&client, &job).await?;
        Ok(())
    }
}
