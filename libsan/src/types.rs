//! Core data model: protocols, volume configs, access info, pools and backends.
//!
//! These types are shared by the driver trait, the ONTAP SAN backend and the
//! orchestration layer that persists them.  They are all
//! [`Serialize`]/[`Deserialize`] with camelCase field names so they can be
//! stored in the backend registry as JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::Offers;

// ---------------------------------------------------------------------------
// Protocol & access mode
// ---------------------------------------------------------------------------

/// Data-path protocol family a backend serves.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// File protocols (NFS).
    File,
    /// Block protocols (iSCSI).
    #[default]
    Block,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Block => f.write_str("block"),
        }
    }
}

/// Describes how a volume may be accessed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    /// Single-node read-write.
    #[default]
    ReadWriteOnce,
    /// Multi-node read-only.
    ReadOnlyMany,
    /// Multi-node read-write.
    ReadWriteMany,
}

// ---------------------------------------------------------------------------
// Volume config
// ---------------------------------------------------------------------------

/// Connection details a host needs to attach a block volume.
///
/// Every field starts empty and is filled exclusively by the LUN mapping step
/// of the SAN driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAccessInfo {
    /// Target portal address (the data LIF).
    #[serde(default)]
    pub iscsi_target_portal: String,
    /// IQN of the target node serving the LUN.
    #[serde(default)]
    pub iscsi_target_iqn: String,
    /// LUN number within the initiator group.
    #[serde(default)]
    pub iscsi_lun_number: i32,
    /// Initiator group the LUN is mapped into.
    #[serde(default)]
    pub iscsi_igroup: String,
}

impl VolumeAccessInfo {
    /// `true` when no mapping has been recorded yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A volume as the orchestration layer sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeConfig {
    pub version: String,
    /// Orchestration-facing name.
    pub name: String,
    /// Sanitized name used on the controller.
    #[serde(default)]
    pub internal_name: String,
    /// Size in bytes, as a decimal string.
    pub size: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub snapshot_policy: String,
    #[serde(default)]
    pub export_policy: String,
    /// `"true"` or `"false"`.
    #[serde(default)]
    pub snapshot_dir: String,
    #[serde(default)]
    pub unix_permissions: String,
    #[serde(default)]
    pub storage_class: String,
    #[serde(default)]
    pub access_mode: AccessMode,
    #[serde(default)]
    pub access_info: VolumeAccessInfo,
    #[serde(default)]
    pub block_size: String,
    #[serde(default)]
    pub file_system: String,
}

/// A volume reconstructed from controller metadata for import and inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeExternal {
    pub config: VolumeConfig,
    /// Name of the backend that owns the volume.
    pub backend: String,
    /// Aggregate containing the volume.
    pub pool: String,
}

// ---------------------------------------------------------------------------
// Pools & backends
// ---------------------------------------------------------------------------

/// A pool of capacity (an aggregate) with the capabilities it offers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoragePool {
    pub name: String,
    /// Name of the backend this pool belongs to.
    pub backend: String,
    pub attributes: Offers,
}

impl StoragePool {
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            attributes: Offers::new(),
        }
    }
}

/// Identity of a registered storage backend.
///
/// Owned by the orchestration layer; a driver only decorates it in
/// [`StorageDriver::get_storage_backend_specs`](crate::driver::StorageDriver::get_storage_backend_specs).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageBackend {
    pub name: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub online: bool,
    /// Pools keyed by name.
    #[serde(default)]
    pub storage: BTreeMap<String, StoragePool>,
}
