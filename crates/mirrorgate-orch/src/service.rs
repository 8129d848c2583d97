//! The `Orchestrator` itself: construction, registry-facing cluster
//! operations, connectivity and health probes, and the shared guard
//! helpers the lifecycle modules build on.

use crate::policies::Policies;
use crate::traits::{MirrorDaemon, PeerControlPlane, PeerEndpoint};
use log::{info, warn};
use mirrorgate_core::{try_each_until_success, DaemonEndpointResolver, DrError, DrResult};
use mirrorgate_registry::{
    AgentStatus, ClusterRole, ClusterStatus, DrCluster, DrRegistry, MirrorVolumeStatus,
};
use uuid::Uuid;

/// Default mirror snapshot schedule when the cluster has no interval
/// attribute.
pub const DEFAULT_MIRROR_INTERVAL: &str = "1h";

/// Drives both remote systems through the DR lifecycle. All clients are
/// injected; see `adapters` for the production wiring.
pub struct Orchestrator<R, D, P, E> {
    pub(crate) registry: R,
    pub(crate) daemon: D,
    pub(crate) peer: P,
    pub(crate) resolver: E,
    /// This site's own management API, used for local VM-state guards.
    pub(crate) local: PeerEndpoint,
    pub(crate) policies: Policies,
    enabled: bool,
}

impl<R, D, P, E> Orchestrator<R, D, P, E>
where
    R: DrRegistry,
    D: MirrorDaemon,
    P: PeerControlPlane,
    E: DaemonEndpointResolver,
{
    pub fn new(registry: R, daemon: D, peer: P, resolver: E, local: PeerEndpoint) -> Self {
        Self {
            registry,
            daemon,
            peer,
            resolver,
            local,
            policies: Policies::default(),
            enabled: true,
        }
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    /// External feature flag; when off every operation fails fast with
    /// `Disabled` before any remote call.
    pub fn with_feature_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    // ── Shared plumbing ─────────────────────────────────────────────

    pub(crate) fn ensure_enabled(&self) -> DrResult<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(DrError::Disabled)
        }
    }

    pub(crate) async fn load_cluster(&self, id: Uuid) -> DrResult<DrCluster> {
        match self.registry.get_cluster(id).await? {
            Some(c) if !c.is_removed() => Ok(c),
            _ => Err(DrError::validation(format!("no such DR cluster {id}"))),
        }
    }

    pub(crate) fn peer_endpoint(cluster: &DrCluster) -> PeerEndpoint {
        PeerEndpoint {
            base_url: cluster.url.clone(),
            api_key: cluster.api_key.clone(),
            secret_key: cluster.secret_key.clone(),
        }
    }

    /// Fresh local candidate list; never cached across operations.
    pub(crate) async fn local_candidates(&self) -> DrResult<Vec<String>> {
        self.resolver.resolve().await
    }

    pub(crate) fn interval_of(cluster: &DrCluster) -> String {
        cluster
            .attributes
            .get(mirrorgate_registry::cluster::attr::MIRROR_INTERVAL)
            .cloned()
            .unwrap_or_else(|| DEFAULT_MIRROR_INTERVAL.to_string())
    }

    /// Mark the pairing failed on both sides. The peer notification is
    /// best-effort; the local registry write is not.
    pub(crate) async fn mark_failed(&self, cluster: &DrCluster) -> DrResult<()> {
        self.registry
            .set_statuses(cluster.id, ClusterStatus::Error, AgentStatus::Error)
            .await?;
        let ep = Self::peer_endpoint(cluster);
        let params = vec![
            ("name".to_string(), cluster.name.clone()),
            ("drclusterstatus".to_string(), "Error".to_string()),
            ("mirroringagentstatus".to_string(), "Error".to_string()),
        ];
        if let Err(e) = self.peer.update_dr_registration(&ep, &params).await {
            warn!(
                "could not propagate Error state to peer of '{}': {}",
                cluster.name, e
            );
        }
        Ok(())
    }

    /// Guard: every named VM reported Stopped by the given management
    /// endpoint. A VM the endpoint does not know is treated as stopped.
    pub(crate) async fn ensure_vms_stopped(
        &self,
        ep: &PeerEndpoint,
        names: &[String],
        side: &str,
    ) -> DrResult<()> {
        for name in names {
            let rows = self.peer.list_virtual_machines(ep, Some(name)).await?;
            if let Some(vm) = rows.iter().find(|vm| &vm.name == name && !vm.is_stopped()) {
                return Err(DrError::guard(format!(
                    "{} VM '{}' is {}, must be Stopped",
                    side, vm.name, vm.state
                )));
            }
        }
        Ok(())
    }

    // ── Cluster registry operations ─────────────────────────────────

    /// Register a new pairing row. Role-specific invariants are enforced
    /// here, before anything remote happens.
    pub async fn create_cluster(&self, cluster: DrCluster) -> DrResult<Uuid> {
        self.ensure_enabled()?;
        cluster.validate()?;
        let id = cluster.id;
        self.registry.insert_cluster(cluster).await?;
        Ok(id)
    }

    /// Update mutable fields. The role is immutable and not accepted here.
    pub async fn update_cluster(
        &self,
        id: Uuid,
        description: Option<String>,
        url: Option<String>,
        attributes: Vec<(String, String)>,
    ) -> DrResult<()> {
        self.ensure_enabled()?;
        let mut cluster = self.load_cluster(id).await?;
        if let Some(d) = description {
            cluster.description = d;
        }
        if let Some(u) = url {
            if u.trim().is_empty() {
                return Err(DrError::validation("cluster url must not be empty"));
            }
            cluster.url = u.trim_end_matches('/').to_string();
        }
        for (k, v) in attributes {
            cluster.attributes.insert(k, v);
        }
        self.registry.update_cluster(cluster).await
    }

    /// Remove a pairing. On a secondary row the daemon-side pairing is
    /// torn down first and the reciprocal registration deleted
    /// best-effort; a primary row is registry-only.
    pub async fn delete_cluster(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        let cluster = self.load_cluster(id).await?;
        if cluster.role() == ClusterRole::Secondary {
            let host = cluster
                .daemon_address
                .clone()
                .ok_or_else(|| DrError::validation("secondary cluster has no daemon address"))?;
            let candidates = self.local_candidates().await?;
            try_each_until_success(&candidates, |addr| {
                let host = host.clone();
                async move { self.daemon.pair_remove(addr, &host).await }
            })
            .await?;

            let ep = Self::peer_endpoint(&cluster);
            match self.peer.list_dr_registrations(&ep).await {
                Ok(rows) => {
                    for row in rows.iter().filter(|r| r.name == cluster.name) {
                        if let Err(e) = self.peer.delete_dr_registration(&ep, &row.id).await {
                            warn!("reciprocal registration delete failed: {}", e);
                        }
                    }
                }
                Err(e) => warn!("could not list peer registrations: {}", e),
            }
        }
        for mapping in self.registry.list_mappings_for_cluster(id).await? {
            self.registry.delete_mapping(mapping.id).await?;
        }
        info!("removing DR cluster '{}'", cluster.name);
        self.registry.remove_cluster(id).await
    }

    // ── Probes ──────────────────────────────────────────────────────

    /// Pre-registration connectivity check: can this site reach the
    /// peer's management API and at least one of its daemon candidates?
    pub async fn connectivity_test(
        &self,
        url: &str,
        api_key: &str,
        secret_key: &str,
    ) -> DrResult<bool> {
        self.ensure_enabled()?;
        let ep = PeerEndpoint {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
        };
        let candidates = self.peer.scvm_addresses(&ep).await?;
        for addr in &candidates {
            match self.daemon.health_usable(addr).await {
                Ok(usable) => return Ok(usable),
                Err(e) => warn!("daemon candidate {} health probe failed: {}", addr, e),
            }
        }
        Ok(false)
    }

    /// Poll the mirroring daemon's own health and fold it into the
    /// cluster's agent status.
    pub async fn refresh_agent_status(&self, id: Uuid) -> DrResult<AgentStatus> {
        self.ensure_enabled()?;
        let mut cluster = self.load_cluster(id).await?;
        let candidates = self.local_candidates().await?;
        let agent = match try_each_until_success(&candidates, |addr| async move {
            self.daemon.mirror_health(addr).await
        })
        .await
        {
            Ok(health) => {
                let h = health.daemon_health.to_ascii_uppercase();
                if h.contains("OK") {
                    AgentStatus::Enabled
                } else if h.contains("WARNING") {
                    AgentStatus::Warning
                } else {
                    AgentStatus::Error
                }
            }
            Err(DrError::Transport(e)) => {
                warn!("mirror daemon unreachable while refreshing: {}", e);
                AgentStatus::Error
            }
            Err(e) => return Err(e),
        };
        cluster.agent_status = agent;
        self.registry.update_cluster(cluster).await?;
        Ok(agent)
    }

    /// Re-derive every mapping row's replication status from a fresh
    /// `imageStatus` poll. Unreachable daemon degrades rows to Unknown.
    pub async fn refresh_mirror_status(&self, id: Uuid) -> DrResult<()> {
        self.ensure_enabled()?;
        self.load_cluster(id).await?;
        let candidates = self.local_candidates().await?;
        for mut mapping in self.registry.list_mappings_for_cluster(id).await? {
            let image = mapping.image_name.clone();
            let polled = try_each_until_success(&candidates, |addr| {
                let image = image.clone();
                async move { self.daemon.image_status(addr, &image).await }
            })
            .await;
            mapping.status = match polled {
                Ok(status) if status.any_peer_unhealthy() => MirrorVolumeStatus::Error,
                Ok(status) if status.all_peers_idle() => MirrorVolumeStatus::Ready,
                Ok(_) => MirrorVolumeStatus::Syncing,
                Err(DrError::Transport(_)) => MirrorVolumeStatus::Unknown,
                Err(e) => return Err(e),
            };
            self.registry.update_mapping(mapping).await?;
        }
        Ok(())
    }
}
