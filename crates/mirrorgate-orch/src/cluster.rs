//! Cluster-level lifecycle operations.
//!
//! Each operation is one strictly sequential pass over the cluster's
//! mapping rows: guards first, then bounded-retry daemon sequences, then
//! registry writes. Partial failures beyond the documented best-effort
//! steps surface as errors for manual cleanup; an automatic "fix" during
//! a two-phase promote/demote could itself lose data.

use crate::keyfile::ScopedKeyFile;
use crate::service::Orchestrator;
use crate::traits::{MirrorDaemon, PeerControlPlane};
use log::{info, warn};
use mirrorgate_core::{try_each_until_success, DaemonEndpointResolver, DrError, DrResult};
use mirrorgate_glue::PairSetupRequest;
use mirrorgate_registry::{
    AgentStatus, ClusterRole, ClusterStatus, DrRegistry, MirrorVolumeStatus, VmMirrorMapping,
};
use tokio::sync::Mutex;
use tokio::time::sleep;
use uuid::Uuid;

/// Serializes the trailing resync cool-down across the whole process so
/// concurrent resyncs cannot interleave during the window.
static RESYNC_GATE: Mutex<()> = Mutex::const_new(());

/// Daemon-side service unit restarted before a resync.
const MIRROR_SERVICE: &str = "rbd-mirror";

fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn parent_images(mappings: &[VmMirrorMapping]) -> Vec<String> {
    distinct(mappings.iter().filter_map(|m| m.parent_image.clone()))
}

impl<R, D, P, E> Orchestrator<R, D, P, E>
where
    R: DrRegistry,
    D: MirrorDaemon,
    P: PeerControlPlane,
    E: DaemonEndpointResolver,
{
    /// Pair this site with the secondary cluster: register reciprocally
    /// on the peer, then hand the peer's private key and daemon address
    /// to the local daemon. Success ends Enabled/Enabled on both sides;
    /// every failure path ends Error/Error and notifies the peer.
    pub async fn setup(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        if cluster.role() != ClusterRole::Secondary {
            return Err(DrError::validation("setup targets a secondary cluster"));
        }
        cluster.validate()?;
        let host = cluster
            .daemon_address
            .clone()
            .unwrap_or_default();
        let private_key = cluster.private_key.clone().unwrap_or_default();
        let ep = Self::peer_endpoint(&cluster);

        // Reciprocal registration on the peer; it records this site as
        // its primary.
        let registration = vec![
            ("name".to_string(), cluster.name.clone()),
            ("description".to_string(), cluster.description.clone()),
            ("drclustertype".to_string(), "primary".to_string()),
            ("drclusterurl".to_string(), self.local.base_url.clone()),
            ("apikey".to_string(), self.local.api_key.clone()),
            ("secretkey".to_string(), self.local.secret_key.clone()),
        ];
        if let Err(e) = self.peer.create_dr_registration(&ep, &registration).await {
            self.mark_failed(&cluster).await?;
            return Err(e);
        }

        // The key exists on disk only for the duration of this call.
        let key_file = ScopedKeyFile::create(&private_key)?;
        let key_bytes = key_file.bytes()?;
        let req = PairSetupRequest {
            host: host.clone(),
            ..PairSetupRequest::default()
        };
        let candidates = self.local_candidates().await?;
        let paired = try_each_until_success(&candidates, |addr| {
            let req = req.clone();
            let key = key_bytes.clone();
            async move { self.daemon.pair_setup(addr, &req, key).await }
        })
        .await;
        drop(key_file);
        if let Err(e) = paired {
            self.mark_failed(&cluster).await?;
            return Err(e);
        }

        self.registry
            .set_statuses(id, ClusterStatus::Enabled, AgentStatus::Enabled)
            .await?;
        info!("DR pairing established with '{}'", cluster.name);

        // Push the snapshot interval to the peer's own daemon and flip
        // the reciprocal registration to Enabled. Both best-effort: the
        // pairing itself is already up.
        let interval = Self::interval_of(&cluster);
        let our_addr = candidates.first().cloned().unwrap_or_default();
        match self.peer.scvm_addresses(&ep).await {
            Ok(peer_candidates) => {
                let pushed = try_each_until_success(&peer_candidates, |addr| {
                    let interval = interval.clone();
                    let our_addr = our_addr.clone();
                    async move { self.daemon.pair_update(addr, &interval, &our_addr).await }
                })
                .await;
                if let Err(e) = pushed {
                    warn!("interval push to peer daemon failed: {}", e);
                }
            }
            Err(e) => warn!("peer daemon discovery failed: {}", e),
        }
        let enabled = vec![
            ("name".to_string(), cluster.name.clone()),
            ("drclusterstatus".to_string(), "Enabled".to_string()),
            ("mirroringagentstatus".to_string(), "Enabled".to_string()),
        ];
        if let Err(e) = self.peer.update_dr_registration(&ep, &enabled).await {
            warn!("reciprocal Enabled update failed: {}", e);
        }
        Ok(())
    }

    /// Turn pool-level mirroring on.
    pub async fn enable(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        let candidates = self.local_candidates().await?;
        let out = try_each_until_success(&candidates, |addr| async move {
            self.daemon.pool_mirror_enable(addr).await
        })
        .await;
        if let Err(e) = out {
            self.mark_failed(&cluster).await?;
            return Err(e);
        }
        self.registry
            .set_statuses(id, ClusterStatus::Enabled, AgentStatus::Enabled)
            .await
    }

    /// Turn pool-level mirroring off and drop every mapping row. Each
    /// peer-side VM record deletion is independent and best-effort.
    pub async fn disable(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        let candidates = self.local_candidates().await?;
        let out = try_each_until_success(&candidates, |addr| async move {
            self.daemon.pool_mirror_disable(addr).await
        })
        .await;
        if let Err(e) = out {
            self.mark_failed(&cluster).await?;
            return Err(e);
        }
        let ep = Self::peer_endpoint(&cluster);
        for mapping in self.registry.list_mappings_for_cluster(id).await? {
            if !mapping.peer_vm_id.is_empty() {
                if let Err(e) = self.peer.delete_dr_vm_record(&ep, &mapping.peer_vm_id).await {
                    warn!(
                        "peer record delete for VM '{}' failed: {}",
                        mapping.peer_vm_name, e
                    );
                }
            }
            self.registry.delete_mapping(mapping.id).await?;
        }
        self.registry
            .set_statuses(id, ClusterStatus::Disabled, AgentStatus::Disabled)
            .await
    }

    /// Make every mapped volume's local copy authoritative. Idempotent:
    /// volumes already primary (or mid force-promote) are skipped without
    /// issuing any mutation.
    pub async fn promote(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        let mappings = self.registry.list_mappings_for_cluster(id).await?;
        let local_vms = distinct(mappings.iter().map(|m| m.vm_name.clone()));
        self.ensure_vms_stopped(&self.local, &local_vms, "local")
            .await?;

        let candidates = self.local_candidates().await?;
        for mut mapping in mappings.clone() {
            let image = mapping.image_name.clone();
            let status = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_status(addr, &image).await }
            })
            .await?;
            if status.is_local_primary() {
                continue;
            }
            self.policies
                .volume_promote
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
            mapping.status = MirrorVolumeStatus::Ready;
            self.registry.update_mapping(mapping).await?;
        }

        // Parent/template image housekeeping, separate smaller bound.
        for parent in parent_images(&mappings) {
            let status = try_each_until_success(&candidates, |addr| {
                let parent = parent.clone();
                async move { self.daemon.image_status(addr, &parent).await }
            })
            .await?;
            if status.is_local_primary() {
                continue;
            }
            self.policies
                .parent_image
                .run(&parent, |_| {
                    let parent = parent.clone();
                    let candidates = &candidates;
                    async move {
                        try_each_until_success(candidates, |addr| {
                            let parent = parent.clone();
                            async move { self.daemon.image_promote(addr, &parent).await }
                        })
                        .await
                    }
                })
                .await?;
        }
        info!("promote complete for '{}'", cluster.name);
        Ok(())
    }

    /// Hand authority over every mapped volume to the peer: demote the
    /// local copy, promote the peer copy, then re-establish replication
    /// toward the peer.
    pub async fn demote(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        let mappings = self.registry.list_mappings_for_cluster(id).await?;
        let ep = Self::peer_endpoint(&cluster);
        let local_vms = distinct(mappings.iter().map(|m| m.vm_name.clone()));
        let peer_vms = distinct(mappings.iter().map(|m| m.peer_vm_name.clone()));
        self.ensure_vms_stopped(&self.local, &local_vms, "local")
            .await?;
        self.ensure_vms_stopped(&ep, &peer_vms, "peer").await?;

        let candidates = self.local_candidates().await?;
        let interval = Self::interval_of(&cluster);
        let peer_candidates = self.peer.scvm_addresses(&ep).await.unwrap_or_else(|e| {
            warn!("peer daemon discovery failed: {}", e);
            Vec::new()
        });

        // Safety snapshots of every ROOT volume before anything
        // destructive. Failure is logged, never fatal.
        for vm in &local_vms {
            let roots: Vec<String> = mappings
                .iter()
                .filter(|m| &m.vm_name == vm && m.is_root())
                .map(|m| m.image_name.clone())
                .collect();
            if roots.is_empty() {
                continue;
            }
            let snapped = try_each_until_success(&candidates, |addr| {
                let roots = roots.clone();
                let vm = vm.clone();
                async move { self.daemon.image_snapshot(addr, &vm, &roots).await }
            })
            .await;
            if let Err(e) = snapped {
                warn!("pre-demote snapshot of '{}' failed: {}", vm, e);
            }
        }

        for mut mapping in mappings.clone() {
            let image = mapping.image_name.clone();
            self.demote_one_image(&candidates, &image).await?;

            // Replication restart and schedule handoff are best-effort;
            // authority has already moved.
            let resynced = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_resync(addr, &image).await }
            })
            .await;
            if let Err(e) = resynced {
                warn!("post-demote resync of '{}' failed: {}", image, e);
            }
            let scheduled = try_each_until_success(&peer_candidates, |addr| {
                let image = image.clone();
                let interval = interval.clone();
                async move {
                    self.daemon
                        .image_mirror_enable(addr, &image, &interval, None)
                        .await
                }
            })
            .await;
            if let Err(e) = scheduled {
                warn!("snapshot-schedule handoff for '{}' failed: {}", image, e);
            }

            mapping.status = MirrorVolumeStatus::Syncing;
            self.registry.update_mapping(mapping).await?;
        }

        for parent in parent_images(&mappings) {
            self.demote_one_image(&candidates, &parent).await?;
        }
        info!("demote complete for '{}'", cluster.name);
        Ok(())
    }

    /// The two-phase core of a demote: local demote (fatal), then the
    /// bounded promote-peer handoff loop (fatal on exhaustion).
    pub(crate) async fn demote_one_image(
        &self,
        candidates: &[String],
        image: &str,
    ) -> DrResult<()> {
        try_each_until_success(candidates, |addr| async move {
            self.daemon.image_demote(addr, image).await
        })
        .await?;
        self.policies
            .peer_handoff
            .run(image, |_| async move {
                try_each_until_success(candidates, |addr| async move {
                    self.daemon.image_promote_peer(addr, image).await
                })
                .await
            })
            .await
    }

    /// Recover from a split-brain after a site outage: restart the peer
    /// daemon, wait for it to rejoin, then demote-peer + resync-peer each
    /// volume both sides claim to own.
    pub async fn resync(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        let mappings = self.registry.list_mappings_for_cluster(id).await?;
        let ep = Self::peer_endpoint(&cluster);
        let local_vms = distinct(mappings.iter().map(|m| m.vm_name.clone()));
        let peer_vms = distinct(mappings.iter().map(|m| m.peer_vm_name.clone()));
        self.ensure_vms_stopped(&self.local, &local_vms, "local")
            .await?;
        self.ensure_vms_stopped(&ep, &peer_vms, "peer").await?;

        let candidates = self.local_candidates().await?;
        let peer_candidates = self.peer.scvm_addresses(&ep).await?;

        try_each_until_success(&peer_candidates, |addr| async move {
            self.daemon.restart_daemon_service(addr, MIRROR_SERVICE).await
        })
        .await?;
        sleep(self.policies.daemon_rejoin_wait).await;

        let mut targets: Vec<String> = mappings.iter().map(|m| m.image_name.clone()).collect();
        targets.extend(parent_images(&mappings));
        for image in targets {
            let local_status = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_status(addr, &image).await }
            })
            .await?;
            let peer_status = try_each_until_success(&peer_candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_status(addr, &image).await }
            })
            .await?;
            if !(local_status.is_local_primary() && peer_status.is_local_primary()) {
                continue;
            }
            info!("split-brain on '{}', forcing peer back to secondary", image);
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
                            async move { self.daemon.image_resync_peer(addr, &image).await }
                        })
                        .await
                    }
                })
                .await?;
        }

        // Trailing cool-down, one resync at a time across the process.
        let _gate = RESYNC_GATE.lock().await;
        sleep(self.policies.resync_cooldown).await;
        info!("resync complete for '{}'", cluster.name);
        Ok(())
    }

    /// Tear every mirror relationship down, then reclaim daemon-side
    /// garbage. All-or-nothing at the unmirror step: one failed delete
    /// aborts before the collection runs.
    pub async fn clear(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        let mappings = self.registry.list_mappings_for_cluster(id).await?;
        let candidates = self.local_candidates().await?;
        for mapping in &mappings {
            let image = mapping.image_name.clone();
            try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_delete(addr, &image).await }
            })
            .await?;
        }
        try_each_until_success(&candidates, |addr| async move {
            self.daemon.pool_garbage_collect(addr).await
        })
        .await?;
        for mapping in mappings {
            self.registry.delete_mapping(mapping.id).await?;
        }
        info!("cleared mirror relationships for '{}'", cluster.name);
        Ok(())
    }
}
