//! Registry storage trait and the in-memory reference implementation.

use crate::cluster::{AgentStatus, ClusterStatus, DrCluster};
use crate::vm_map::VmMirrorMapping;
use async_trait::async_trait;
use chrono::Utc;
use mirrorgate_core::{DrError, DrResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage contract for the DR topology. Cluster removal is logical:
/// removed rows keep their history but stop counting toward name
/// uniqueness and disappear from listings.
#[async_trait]
pub trait DrRegistry: Send + Sync {
    /// Insert a new cluster row. Name must be unique among non-removed
    /// rows.
    async fn insert_cluster(&self, cluster: DrCluster) -> DrResult<()>;

    async fn get_cluster(&self, id: Uuid) -> DrResult<Option<DrCluster>>;

    async fn find_cluster_by_name(&self, name: &str) -> DrResult<Option<DrCluster>>;

    /// Non-removed rows only.
    async fn list_clusters(&self) -> DrResult<Vec<DrCluster>>;

    /// Replace an existing row wholesale. The row must exist.
    async fn update_cluster(&self, cluster: DrCluster) -> DrResult<()>;

    /// Convenience write for the common status transitions.
    async fn set_statuses(
        &self,
        id: Uuid,
        status: ClusterStatus,
        agent_status: AgentStatus,
    ) -> DrResult<()>;

    /// Logical remove: stamps `removed`, keeps the row.
    async fn remove_cluster(&self, id: Uuid) -> DrResult<()>;

    async fn insert_mapping(&self, mapping: VmMirrorMapping) -> DrResult<()>;

    async fn get_mapping(&self, id: Uuid) -> DrResult<Option<VmMirrorMapping>>;

    async fn list_mappings_for_cluster(&self, cluster_id: Uuid)
        -> DrResult<Vec<VmMirrorMapping>>;

    async fn list_mappings_for_vm(
        &self,
        cluster_id: Uuid,
        vm_id: &str,
    ) -> DrResult<Vec<VmMirrorMapping>>;

    async fn update_mapping(&self, mapping: VmMirrorMapping) -> DrResult<()>;

    /// Physical delete; mapping rows carry no history.
    async fn delete_mapping(&self, id: Uuid) -> DrResult<()>;

    async fn get_attribute(&self, cluster_id: Uuid, key: &str) -> DrResult<Option<String>>;

    async fn put_attribute(&self, cluster_id: Uuid, key: &str, value: &str) -> DrResult<()>;
}

/// RwLock'd maps. Reference implementation and the test double of choice.
#[derive(Default)]
pub struct MemoryRegistry {
    clusters: RwLock<HashMap<Uuid, DrCluster>>,
    mappings: RwLock<HashMap<Uuid, VmMirrorMapping>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrRegistry for MemoryRegistry {
    async fn insert_cluster(&self, cluster: DrCluster) -> DrResult<()> {
        let mut rows = self.clusters.write().await;
        let duplicate = rows
            .values()
            .any(|c| !c.is_removed() && c.name == cluster.name);
        if duplicate {
            return Err(DrError::validation(format!(
                "cluster name '{}' already in use",
                cluster.name
            )));
        }
        rows.insert(cluster.id, cluster);
        Ok(())
    }

    async fn get_cluster(&self, id: Uuid) -> DrResult<Option<DrCluster>> {
        Ok(self.clusters.read().await.get(&id).cloned())
    }

    async fn find_cluster_by_name(&self, name: &str) -> DrResult<Option<DrCluster>> {
        Ok(self
            .clusters
            .read()
            .await
            .values()
            .find(|c| !c.is_removed() && c.name == name)
            .cloned())
    }

    async fn list_clusters(&self) -> DrResult<Vec<DrCluster>> {
        let mut rows: Vec<DrCluster> = self
            .clusters
            .read()
            .await
            .values()
            .filter(|c| !c.is_removed())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(rows)
    }

    async fn update_cluster(&self, cluster: DrCluster) -> DrResult<()> {
        let mut rows = self.clusters.write().await;
        if !rows.contains_key(&cluster.id) {
            return Err(DrError::registry(format!(
                "no cluster row {} to update",
                cluster.id
            )));
        }
        rows.insert(cluster.id, cluster);
        Ok(())
    }

    async fn set_statuses(
        &self,
        id: Uuid,
        status: ClusterStatus,
        agent_status: AgentStatus,
    ) -> DrResult<()> {
        let mut rows = self.clusters.write().await;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| DrError::registry(format!("no cluster row {id}")))?;
        row.status = status;
        row.agent_status = agent_status;
        Ok(())
    }

    async fn remove_cluster(&self, id: Uuid) -> DrResult<()> {
        let mut rows = self.clusters.write().await;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| DrError::registry(format!("no cluster row {id}")))?;
        row.removed = Some(Utc::now());
        Ok(())
    }

    async fn insert_mapping(&self, mapping: VmMirrorMapping) -> DrResult<()> {
        self.mappings.write().await.insert(mapping.id, mapping);
        Ok(())
    }

    async fn get_mapping(&self, id: Uuid) -> DrResult<Option<VmMirrorMapping>> {
        Ok(self.mappings.read().await.get(&id).cloned())
    }

    async fn list_mappings_for_cluster(
        &self,
        cluster_id: Uuid,
    ) -> DrResult<Vec<VmMirrorMapping>> {
        let mut rows: Vec<VmMirrorMapping> = self
            .mappings
            .read()
            .await
            .values()
            .filter(|m| m.cluster_id == cluster_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.image_name.cmp(&b.image_name));
        Ok(rows)
    }

    async fn list_mappings_for_vm(
        &self,
        cluster_id: Uuid,
        vm_id: &str,
    ) -> DrResult<Vec<VmMirrorMapping>> {
        let mut rows: Vec<VmMirrorMapping> = self
            .mappings
            .read()
            .await
            .values()
            .filter(|m| m.cluster_id == cluster_id && m.vm_id == vm_id)
            .cloned()
            .collect();
        // ROOT before DATA: the peer placeholder VM must exist before
        // attachments.
        rows.sort_by_key(|m| (!m.is_root(), m.image_name.clone()));
        Ok(rows)
    }

    async fn update_mapping(&self, mapping: VmMirrorMapping) -> DrResult<()> {
        let mut rows = self.mappings.write().await;
        if !rows.contains_key(&mapping.id) {
            return Err(DrError::registry(format!(
                "no mapping row {} to update",
                mapping.id
            )));
        }
        rows.insert(mapping.id, mapping);
        Ok(())
    }

    async fn delete_mapping(&self, id: Uuid) -> DrResult<()> {
        self.mappings.write().await.remove(&id);
        Ok(())
    }

    async fn get_attribute(&self, cluster_id: Uuid, key: &str) -> DrResult<Option<String>> {
        Ok(self
            .clusters
            .read()
            .await
            .get(&cluster_id)
            .and_then(|c| c.attributes.get(key).cloned()))
    }

    async fn put_attribute(&self, cluster_id: Uuid, key: &str, value: &str) -> DrResult<()> {
        let mut rows = self.clusters.write().await;
        let row = rows
            .get_mut(&cluster_id)
            .ok_or_else(|| DrError::registry(format!("no cluster row {cluster_id}")))?;
        row.attributes.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterRole;
    use crate::vm_map::VolumeKind;

    fn cluster(name: &str) -> DrCluster {
        DrCluster::new(name, "", "https://peer", ClusterRole::Secondary, "ak", "sk").unwrap()
    }

    #[tokio::test]
    async fn names_are_unique_among_live_rows() {
        let reg = MemoryRegistry::new();
        let first = cluster("site-b");
        let first_id = first.id;
        reg.insert_cluster(first).await.unwrap();
        assert!(reg.insert_cluster(cluster("site-b")).await.is_err());

        // Logical removal frees the name.
        reg.remove_cluster(first_id).await.unwrap();
        reg.insert_cluster(cluster("site-b")).await.unwrap();
    }

    #[tokio::test]
    async fn removed_rows_stay_fetchable_but_unlisted() {
        let reg = MemoryRegistry::new();
        let c = cluster("site-b");
        let id = c.id;
        reg.insert_cluster(c).await.unwrap();
        reg.remove_cluster(id).await.unwrap();
        assert!(reg.get_cluster(id).await.unwrap().is_some());
        assert!(reg.list_clusters().await.unwrap().is_empty());
        assert!(reg.find_cluster_by_name("site-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_transitions_persist() {
        let reg = MemoryRegistry::new();
        let c = cluster("site-b");
        let id = c.id;
        reg.insert_cluster(c).await.unwrap();
        reg.set_statuses(id, ClusterStatus::Enabled, AgentStatus::Enabled)
            .await
            .unwrap();
        let row = reg.get_cluster(id).await.unwrap().unwrap();
        assert_eq!(row.status, ClusterStatus::Enabled);
        assert_eq!(row.agent_status, AgentStatus::Enabled);
    }

    #[tokio::test]
    async fn vm_listing_puts_root_first() {
        let reg = MemoryRegistry::new();
        let c = cluster("site-b");
        let cid = c.id;
        reg.insert_cluster(c).await.unwrap();
        reg.insert_mapping(VmMirrorMapping::new(cid, "vm-1", "web", VolumeKind::Data, "rbd/a-data"))
            .await
            .unwrap();
        reg.insert_mapping(VmMirrorMapping::new(cid, "vm-1", "web", VolumeKind::Root, "rbd/z-root"))
            .await
            .unwrap();
        let rows = reg.list_mappings_for_vm(cid, "vm-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_root());
    }

    #[tokio::test]
    async fn attributes_round_trip() {
        let reg = MemoryRegistry::new();
        let c = cluster("site-b");
        let id = c.id;
        reg.insert_cluster(c).await.unwrap();
        assert!(reg.get_attribute(id, "k").await.unwrap().is_none());
        reg.put_attribute(id, "k", "v").await.unwrap();
        assert_eq!(reg.get_attribute(id, "k").await.unwrap().as_deref(), Some("v"));
    }
}
