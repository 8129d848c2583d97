//! Per-VM mirror operations: one VM's volume set instead of the whole
//! cluster, but the same guard/bounded-retry discipline.

use crate::service::Orchestrator;
use crate::traits::{MirrorDaemon, PeerControlPlane, PeerEndpoint};
use log::{info, warn};
use mirrorgate_core::{try_each_until_success, DaemonEndpointResolver, DrError, DrResult};
use mirrorgate_registry::{DrRegistry, MirrorVolumeStatus, VmMirrorMapping, VolumeKind};
use serde_json::Value;
use tokio::time::sleep;
use uuid::Uuid;

/// One volume to put under mirroring.
#[derive(Debug, Clone)]
pub struct MirrorVolumeSpec {
    pub kind: VolumeKind,
    /// Mirror image name; equals the volume path on the pool.
    pub image_name: String,
    pub size_gb: u64,
    /// Template image of a ROOT volume, when it is itself mirrored.
    pub parent_image: Option<String>,
}

/// Parameters for establishing a VM mirror: the local VM plus the peer
/// placement the placeholder VM deploys into.
#[derive(Debug, Clone)]
pub struct CreateMirrorVmRequest {
    pub vm_id: String,
    pub vm_name: String,
    pub peer_zone_id: String,
    pub peer_service_offering_id: String,
    pub peer_network_id: String,
    pub volumes: Vec<MirrorVolumeSpec>,
}

fn result_id(value: &Value, object: &str) -> DrResult<String> {
    value
        .pointer(&format!("/{object}/id"))
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DrError::transport(format!("peer job result carried no {object} id")))
}

impl<R, D, P, E> Orchestrator<R, D, P, E>
where
    R: DrRegistry,
    D: MirrorDaemon,
    P: PeerControlPlane,
    E: DaemonEndpointResolver,
{
    /// Put one VM's volumes under mirroring and provision its peer-side
    /// placeholder: ROOT volume first (create, repoint, deploy), then
    /// each DATA volume (create, repoint, attach). The only automatic
    /// rollback is the ROOT mirror relationship on deploy failure; later
    /// partial failures surface for manual cleanup.
    pub async fn create_mirror_vm(
        &self,
        cluster_id: Uuid,
        req: &CreateMirrorVmRequest,
    ) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(cluster_id).await?;
        if !self
            .registry
            .list_mappings_for_vm(cluster_id, &req.vm_id)
            .await?
            .is_empty()
        {
            return Err(DrError::validation(format!(
                "VM '{}' is already mirrored",
                req.vm_name
            )));
        }
        let root = match req
            .volumes
            .iter()
            .filter(|v| v.kind == VolumeKind::Root)
            .collect::<Vec<_>>()
            .as_slice()
        {
            [only] => (*only).clone(),
            [] => return Err(DrError::validation("VM has no ROOT volume")),
            _ => return Err(DrError::validation("VM has more than one ROOT volume")),
        };

        let candidates = self.local_candidates().await?;
        let interval = Self::interval_of(&cluster);
        for volume in &req.volumes {
            let image = volume.image_name.clone();
            try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                let interval = interval.clone();
                async move {
                    self.daemon
                        .image_mirror_enable(addr, &image, &interval, None)
                        .await
                }
            })
            .await?;
        }

        let ep = Self::peer_endpoint(&cluster);
        let root_volume_id = self.provision_peer_volume(&ep, &req.peer_zone_id, &root).await?;
        let deploy = vec![
            ("name".to_string(), req.vm_name.clone()),
            ("volumeid".to_string(), root_volume_id),
            ("zoneid".to_string(), req.peer_zone_id.clone()),
            (
                "serviceofferingid".to_string(),
                req.peer_service_offering_id.clone(),
            ),
            ("networkid".to_string(), req.peer_network_id.clone()),
            ("startvm".to_string(), "false".to_string()),
        ];
        let peer_vm_id = match self.peer.deploy_vm_for_volume(&ep, &deploy).await {
            Ok(result) => result_id(&result, "virtualmachine")?,
            Err(e) => {
                // Without the placeholder VM the ROOT mirror relationship
                // is an orphan; undo it before surfacing the failure.
                let image = root.image_name.clone();
                let rolled_back = try_each_until_success(&candidates, |addr| {
                    let image = image.clone();
                    async move { self.daemon.image_delete(addr, &image).await }
                })
                .await;
                if let Err(rb) = rolled_back {
                    warn!("rollback of ROOT mirror '{}' failed: {}", image, rb);
                }
                return Err(e);
            }
        };

        let mut root_row = VmMirrorMapping::new(
            cluster_id,
            &req.vm_id,
            &req.vm_name,
            VolumeKind::Root,
            &root.image_name,
        );
        if let Some(parent) = &root.parent_image {
            root_row = root_row.with_parent_image(parent);
        }
        root_row.peer_vm_id = peer_vm_id.clone();
        root_row.peer_vm_name = req.vm_name.clone();
        root_row.peer_vm_status = "Stopped".to_string();
        self.registry.insert_mapping(root_row).await?;

        for volume in req.volumes.iter().filter(|v| v.kind == VolumeKind::Data) {
            let volume_id = self.provision_peer_volume(&ep, &req.peer_zone_id, volume).await?;
            let attach = vec![
                ("id".to_string(), volume_id),
                ("virtualmachineid".to_string(), peer_vm_id.clone()),
            ];
            self.peer.attach_volume(&ep, &attach).await?;
            let mut row = VmMirrorMapping::new(
                cluster_id,
                &req.vm_id,
                &req.vm_name,
                VolumeKind::Data,
                &volume.image_name,
            );
            row.peer_vm_id = peer_vm_id.clone();
            row.peer_vm_name = req.vm_name.clone();
            row.peer_vm_status = "Stopped".to_string();
            self.registry.insert_mapping(row).await?;
        }
        info!("VM '{}' is now mirrored to '{}'", req.vm_name, cluster.name);
        Ok(())
    }

    /// create → await → repoint the path at the mirror image → await.
    async fn provision_peer_volume(
        &self,
        ep: &PeerEndpoint,
        zone_id: &str,
        volume: &MirrorVolumeSpec,
    ) -> DrResult<String> {
        let create = vec![
            ("name".to_string(), volume.image_name.clone()),
            ("zoneid".to_string(), zone_id.to_string()),
            ("size".to_string(), volume.size_gb.to_string()),
        ];
        let created = self.peer.create_volume(ep, &create).await?;
        let volume_id = result_id(&created, "volume")?;
        let update = vec![
            ("id".to_string(), volume_id.clone()),
            ("path".to_string(), volume.image_name.clone()),
        ];
        self.peer.update_volume(ep, &update).await?;
        Ok(volume_id)
    }

    /// Tear one VM's mirror pairing down. A mapping row is removed once
    /// the daemon-side delete succeeds, or once the peer confirms it no
    /// longer knows the placeholder VM.
    pub async fn delete_mirror_vm(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(cluster_id).await?;
        let mappings = self.mappings_of(cluster_id, vm_id).await?;
        let ep = Self::peer_endpoint(&cluster);
        let candidates = self.local_candidates().await?;
        for mapping in &mappings {
            let image = mapping.image_name.clone();
            let deleted = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_delete(addr, &image).await }
            })
            .await;
            match deleted {
                Ok(()) => {}
                Err(DrError::Transport(e)) => {
                    let known = self
                        .peer
                        .list_virtual_machines(&ep, Some(&mapping.peer_vm_name))
                        .await?;
                    if known.is_empty() {
                        warn!(
                            "daemon unreachable for '{}' but peer confirms no VM, removing row: {}",
                            image, e
                        );
                    } else {
                        return Err(DrError::transport(e));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        let peer_vm_id = mappings
            .iter()
            .map(|m| m.peer_vm_id.clone())
            .find(|id| !id.is_empty());
        if let Some(peer_vm_id) = peer_vm_id {
            if let Err(e) = self.peer.delete_dr_vm_record(&ep, &peer_vm_id).await {
                warn!("peer record delete failed: {}", e);
            }
        }
        for mapping in mappings {
            self.registry.delete_mapping(mapping.id).await?;
        }
        Ok(())
    }

    /// Boot the peer-side placeholder, but only once every volume is
    /// locally primary with idle peers; booting from a replica that is
    /// still replaying would hand the guest an inconsistent disk.
    pub async fn start_mirror_vm(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(cluster_id).await?;
        let mappings = self.mappings_of(cluster_id, vm_id).await?;
        let peer_vm_id = self.peer_vm_id_of(&mappings)?;
        let candidates = self.local_candidates().await?;
        self.settle_volumes(&candidates, &mappings, true).await?;
        let ep = Self::peer_endpoint(&cluster);
        self.peer.start_vm(&ep, &peer_vm_id).await?;
        info!("started mirrored VM '{}'", mappings[0].vm_name);
        Ok(())
    }

    pub async fn stop_mirror_vm(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(cluster_id).await?;
        let mappings = self.mappings_of(cluster_id, vm_id).await?;
        let peer_vm_id = self.peer_vm_id_of(&mappings)?;
        let ep = Self::peer_endpoint(&cluster);
        self.peer.stop_vm(&ep, &peer_vm_id).await
    }

    /// Single-VM promote: force the peer copy secondary, then the
    /// bounded local promote loop, then best-effort resync of the peer.
    /// No parent-image step at this scope.
    pub async fn promote_mirror_vm(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<()> {
        self.ensure_enabled()?;
        self.load_cluster(cluster_id).await?;
        let mappings = self.mappings_of(cluster_id, vm_id).await?;
        let candidates = self.local_candidates().await?;
        for mut mapping in mappings {
            let image = mapping.image_name.clone();
            try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_demote_peer(addr, &image).await }
            })
            .await?;
            self.policies
                .peer_handoff
                .run(&image, |_| {
                    let image = image.clone();
                    let candidates = &candidates;
                    async move {
                        try_each_until_success(candidates, |addr| {
                            let image = image.clone();
                            async move { self.daemon.image_promote(addr, &image).await }
                        })
                        .await
                    }
                })
                .await?;
            let resynced = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_resync_peer(addr, &image).await }
            })
            .await;
            if let Err(e) = resynced {
                warn!("post-promote peer resync of '{}' failed: {}", image, e);
            }
            mapping.status = MirrorVolumeStatus::Ready;
            self.registry.update_mapping(mapping).await?;
        }
        Ok(())
    }

    /// Single-VM demote: the cluster-level two-phase per volume, plus
    /// best-effort local resync. No parent-image step at this scope.
    pub async fn demote_mirror_vm(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<()> {
        self.ensure_enabled()?;
        self.load_cluster(cluster_id).await?;
        let mappings = self.mappings_of(cluster_id, vm_id).await?;
        let candidates = self.local_candidates().await?;
        for mut mapping in mappings {
            let image = mapping.image_name.clone();
            self.demote_one_image(&candidates, &image).await?;
            let resynced = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_resync(addr, &image).await }
            })
            .await;
            if let Err(e) = resynced {
                warn!("post-demote resync of '{}' failed: {}", image, e);
            }
            mapping.status = MirrorVolumeStatus::Syncing;
            self.registry.update_mapping(mapping).await?;
        }
        Ok(())
    }

    /// Manual mirror snapshot of the VM's images: idle guard, snapshot,
    /// then wait for replication to converge again.
    pub async fn snapshot_mirror_vm(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<()> {
        self.ensure_enabled()?;
        self.load_cluster(cluster_id).await?;
        let mappings = self.mappings_of(cluster_id, vm_id).await?;
        let candidates = self.local_candidates().await?;
        if !self.volumes_settled(&candidates, &mappings).await? {
            return Err(DrError::guard(format!(
                "VM '{}' volumes are not locally primary with idle peers",
                mappings[0].vm_name
            )));
        }
        let vm_name = mappings[0].vm_name.clone();
        let images: Vec<String> = mappings.iter().map(|m| m.image_name.clone()).collect();
        try_each_until_success(&candidates, |addr| {
            let vm_name = vm_name.clone();
            let images = images.clone();
            async move { self.daemon.image_snapshot(addr, &vm_name, &images).await }
        })
        .await?;
        self.settle_volumes(&candidates, &mappings, false).await?;
        Ok(())
    }

    // ── Shared per-VM helpers ───────────────────────────────────────

    async fn mappings_of(&self, cluster_id: Uuid, vm_id: &str) -> DrResult<Vec<VmMirrorMapping>> {
        let mappings = self.registry.list_mappings_for_vm(cluster_id, vm_id).await?;
        if mappings.is_empty() {
            return Err(DrError::validation(format!("VM '{vm_id}' is not mirrored")));
        }
        Ok(mappings)
    }

    fn peer_vm_id_of(&self, mappings: &[VmMirrorMapping]) -> DrResult<String> {
        mappings
            .iter()
            .map(|m| m.peer_vm_id.clone())
            .find(|id| !id.is_empty())
            .ok_or_else(|| DrError::validation("VM has no peer placeholder"))
    }

    /// One pass: are all volumes locally primary with every peer idle?
    async fn volumes_settled(
        &self,
        candidates: &[String],
        mappings: &[VmMirrorMapping],
    ) -> DrResult<bool> {
        for mapping in mappings {
            let image = mapping.image_name.clone();
            let status = try_each_until_success(candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_status(addr, &image).await }
            })
            .await?;
            if !(status.is_local_primary() && status.all_peers_idle()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Bounded settle loop. With `break_on_unavailable`, repeated
    /// transport failures abort early instead of burning the whole bound
    /// against a dead daemon.
    async fn settle_volumes(
        &self,
        candidates: &[String],
        mappings: &[VmMirrorMapping],
        break_on_unavailable: bool,
    ) -> DrResult<()> {
        let policy = self.policies.volume_settle;
        let subject = mappings[0].vm_name.clone();
        let mut consecutive_unavailable = 0u32;
        for attempt in 1..=policy.max_attempts {
            match self.volumes_settled(candidates, mappings).await {
                Ok(true) => return Ok(()),
                Ok(false) => consecutive_unavailable = 0,
                Err(DrError::Transport(e)) => {
                    consecutive_unavailable += 1;
                    if break_on_unavailable
                        && consecutive_unavailable >= self.policies.unavailable_break
                    {
                        return Err(DrError::transport(format!(
                            "daemon unavailable for {} consecutive polls: {}",
                            consecutive_unavailable, e
                        )));
                    }
                    warn!("settle poll {} for '{}' failed: {}", attempt, subject, e);
                }
                Err(e) => return Err(e),
            }
            if attempt < policy.max_attempts && !policy.interval.is_zero() {
                sleep(policy.interval).await;
            }
        }
        Err(DrError::exhausted(&subject, policy.max_attempts))
    }
}
