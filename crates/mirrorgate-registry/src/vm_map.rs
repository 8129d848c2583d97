//! Per-volume VM mirror mappings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Disk role within the VM. The ROOT volume anchors the peer-side
/// placeholder VM; DATA volumes attach to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeKind {
    Root,
    Data,
}

/// Replication state of one mirrored volume as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorVolumeStatus {
    Syncing,
    Ready,
    Error,
    Unknown,
}

/// One (VM, volume) mirror row. The mirror image name equals the volume
/// path on the storage pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmMirrorMapping {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub vm_id: String,
    pub vm_name: String,
    pub peer_vm_id: String,
    pub peer_vm_name: String,
    pub peer_vm_status: String,
    pub volume_kind: VolumeKind,
    pub image_name: String,
    /// Template image the ROOT volume was cloned from, when it is itself
    /// under mirroring and needs the post-promote housekeeping pass.
    pub parent_image: Option<String>,
    pub status: MirrorVolumeStatus,
}

impl VmMirrorMapping {
    pub fn new(
        cluster_id: Uuid,
        vm_id: &str,
        vm_name: &str,
        volume_kind: VolumeKind,
        image_name: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cluster_id,
            vm_id: vm_id.to_string(),
            vm_name: vm_name.to_string(),
            peer_vm_id: String::new(),
            peer_vm_name: String::new(),
            peer_vm_status: String::new(),
            volume_kind,
            image_name: image_name.to_string(),
            parent_image: None,
            status: MirrorVolumeStatus::Syncing,
        }
    }

    pub fn with_parent_image(mut self, image: &str) -> Self {
        self.parent_image = Some(image.to_string());
        self
    }

    pub fn is_root(&self) -> bool {
        self.volume_kind == VolumeKind::Root
    }
}
