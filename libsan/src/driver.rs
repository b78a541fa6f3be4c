//! Storage driver trait.
//!
//! The provisioning layer talks to every backend through [`StorageDriver`]:
//! it asks the driver to describe the backend, derives per-volume options
//! from storage-class requests, and calls the create hooks around volume
//! creation.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::attribute::{Offers, Requests};
use crate::config::PersistentStorageBackendConfig;
use crate::error::SanError;
use crate::types::{Protocol, StorageBackend, StoragePool, VolumeConfig, VolumeExternal};

/// A protocol-specific storage driver.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Fixed name of the driver implementation, e.g. `"ontap-san"`.
    fn name(&self) -> &str;

    /// Name the backend and attach its pools and capability offers.
    async fn get_storage_backend_specs(&self, backend: &mut StorageBackend)
    -> Result<(), SanError>;

    /// Capabilities every pool of this backend offers.
    async fn get_storage_pool_attributes(&self) -> Offers;

    /// Creation options for `volume` placed in `pool`.
    fn get_volume_opts(
        &self,
        volume: &VolumeConfig,
        pool: &StoragePool,
        requests: &Requests,
    ) -> Result<BTreeMap<String, String>, SanError>;

    /// Controller-side name for the orchestration-facing `name`.
    fn get_internal_volume_name(&self, name: &str) -> String;

    /// Fill in driver-derived fields before the volume is created.
    ///
    /// Returns `false` if the volume cannot be created on this backend.
    fn create_prepare(&self, volume: &mut VolumeConfig) -> bool;

    /// Finish a freshly created volume; fills `volume.access_info` for block
    /// drivers.
    async fn create_followup(&self, volume: &mut VolumeConfig) -> Result<(), SanError>;

    fn get_protocol(&self) -> Protocol;

    /// Configured storage driver name.
    fn get_driver_name(&self) -> &str;

    /// Store a sanitized copy of the driver config for the backend registry.
    fn store_config(&self, persistent: &mut PersistentStorageBackendConfig);

    /// Config safe to show to users.
    fn get_external_config(&self) -> serde_json::Value;

    /// Rebuild the descriptor of an existing volume from controller metadata.
    async fn get_external_volume(&self, name: &str) -> Result<VolumeExternal, SanError>;
}
