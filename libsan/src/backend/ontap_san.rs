//! ONTAP iSCSI backend.
//!
//! [`OntapSanDriver`] provisions block volumes on an ONTAP controller and
//! makes them reachable over iSCSI:
//!
//! 1. The backend advertises its capabilities (snapshots, encryption when the
//!    controller supports it, thick and thin provisioning).
//! 2. After the volume container exists, [`OntapSanDriver::map_lun`] maps the
//!    volume's LUN into the configured initiator group and records the
//!    target portal, target IQN and LUN number in the volume's access info.
//! 3. Hosts then attach through [`crate::iscsi::discover_and_login`].
//!
//! Existing volumes can be described for import with
//! [`StorageDriver::get_external_volume`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Span, debug, warn};

use super::common::CommonDriver;
use crate::api::{ApiFeature, ControllerApi};
use crate::attribute::{CapabilityKey, Offer, Offers, Requests};
use crate::config::{
    ONTAP_SAN_STORAGE_DRIVER_NAME, OntapStorageDriverConfig, PersistentStorageBackendConfig,
};
use crate::driver::StorageDriver;
use crate::error::SanError;
use crate::types::{
    AccessMode, Protocol, StorageBackend, StoragePool, VolumeAccessInfo, VolumeConfig,
    VolumeExternal,
};

/// Prefix of backend names; the data LIF follows it.
pub const BACKEND_NAME_PREFIX: &str = "ontapsan";

/// Filesystem reported for imported volumes.  The controller does not know
/// which filesystem a host put on the LUN.
const DEFAULT_FILE_SYSTEM: &str = "ext4";

const VOLUME_CONFIG_VERSION: &str = "1";

const ISCSI_SERVICE_GET_ITER: &str = "iscsi-service-get-iter";

/// Deterministic backend name for `config`: `ontapsan_<dataLIF>`.
pub fn backend_name(config: &OntapStorageDriverConfig) -> String {
    format!("{BACKEND_NAME_PREFIX}_{}", config.data_lif)
}

/// Path of the LUN backing a volume; every volume holds exactly one LUN.
fn lun_path(internal_name: &str) -> String {
    format!("/vol/{internal_name}/lun0")
}

/// Outcome of a successful LUN mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LunMapping {
    /// The LUN is mapped and the SVM's iSCSI target node is known.
    Mapped { lun_id: u16, target_iqn: String },
    /// The LUN is mapped but no iSCSI service was found for the SVM, so the
    /// access info carries no target IQN and hosts cannot log in yet.
    MappedWithoutTarget { lun_id: u16 },
}

impl LunMapping {
    pub fn lun_id(&self) -> u16 {
        match self {
            Self::Mapped { lun_id, .. } | Self::MappedWithoutTarget { lun_id } => *lun_id,
        }
    }

    pub fn target_iqn(&self) -> Option<&str> {
        match self {
            Self::Mapped { target_iqn, .. } => Some(target_iqn),
            Self::MappedWithoutTarget { .. } => None,
        }
    }
}

/// iSCSI storage driver for ONTAP.
pub struct OntapSanDriver {
    common: CommonDriver,
}

impl OntapSanDriver {
    /// Build a driver from a validated config.
    ///
    /// All events the driver emits are parented on `span`.
    pub fn new(config: OntapStorageDriverConfig, api: Arc<dyn ControllerApi>, span: Span) -> Self {
        Self {
            common: CommonDriver::new(config, api, span),
        }
    }

    fn config(&self) -> &OntapStorageDriverConfig {
        self.common.config()
    }

    /// IQN of the first available iSCSI service owned by the configured SVM.
    ///
    /// Stopped services and services without a node name are skipped.  The
    /// service list is fetched on every call; endpoints can move.
    async fn find_target_iqn(&self) -> Result<Option<String>, SanError> {
        let response = self
            .common
            .api()
            .iscsi_service_get_iter()
            .await
            .map_err(|e| {
                SanError::controller(
                    ISCSI_SERVICE_GET_ITER,
                    format!("problem retrieving iSCSI services: {e}"),
                )
            })?;

        if !response.result.is_passed() {
            return Err(SanError::controller(
                ISCSI_SERVICE_GET_ITER,
                format!(
                    "problem retrieving iSCSI services: status {:?}, errno {:?}, reason {:?}",
                    response.result.status, response.result.errno, response.result.reason
                ),
            ));
        }

        let svm = &self.config().svm;
        Ok(response
            .attributes_list
            .into_iter()
            .find(|service| {
                service.is_available && !service.node_name.is_empty() && &service.vserver == svm
            })
            .map(|service| service.node_name))
    }

    /// Map the volume's LUN into the configured initiator group and record
    /// how hosts reach it in `volume.access_info`.
    ///
    /// `volume.internal_name` must be set.  Mapping is idempotent: a LUN that
    /// is already mapped keeps its LUN id.  On error the access info is left
    /// untouched.
    pub async fn map_lun(&self, volume: &mut VolumeConfig) -> Result<LunMapping, SanError> {
        let span = self.common.span();
        let config = self.config();

        let target_iqn = self.find_target_iqn().await?;
        match &target_iqn {
            Some(iqn) => debug!(
                parent: span,
                volume = %volume.name,
                target_iqn = %iqn,
                "discovered target IQN for the volume",
            ),
            None => warn!(
                parent: span,
                volume = %volume.name,
                svm = %config.svm,
                "no iSCSI service found for SVM; volume will have no target IQN",
            ),
        }

        let lun_path = lun_path(&volume.internal_name);
        let lun_id = self
            .common
            .api()
            .lun_map_if_not_mapped(&config.igroup_name, &lun_path)
            .await?;

        volume.access_info = VolumeAccessInfo {
            iscsi_target_portal: config.data_lif.clone(),
            iscsi_target_iqn: target_iqn.clone().unwrap_or_default(),
            iscsi_lun_number: i32::from(lun_id),
            iscsi_igroup: config.igroup_name.clone(),
        };
        debug!(
            parent: span,
            volume = %volume.name,
            volume_internal = %volume.internal_name,
            target_iqn = %volume.access_info.iscsi_target_iqn,
            lun_number = volume.access_info.iscsi_lun_number,
            igroup = %volume.access_info.iscsi_igroup,
            "mapped ONTAP LUN",
        );

        Ok(match target_iqn {
            Some(target_iqn) => LunMapping::Mapped { lun_id, target_iqn },
            None => LunMapping::MappedWithoutTarget { lun_id },
        })
    }
}

#[async_trait]
impl StorageDriver for OntapSanDriver {
    fn name(&self) -> &str {
        ONTAP_SAN_STORAGE_DRIVER_NAME
    }

    async fn get_storage_backend_specs(
        &self,
        backend: &mut StorageBackend,
    ) -> Result<(), SanError> {
        backend.name = backend_name(self.config());
        backend.protocol = self.get_protocol();
        backend.driver_name = self.get_driver_name().to_owned();
        let attributes = self.get_storage_pool_attributes().await;
        self.common.backend_specs(backend, attributes);
        Ok(())
    }

    async fn get_storage_pool_attributes(&self) -> Offers {
        let encryption = self
            .common
            .api()
            .supports_feature(ApiFeature::VolumeEncryption)
            .await;

        Offers::from([
            (
                CapabilityKey::BackendType,
                Offer::new_string_offer([self.name()]),
            ),
            (CapabilityKey::Snapshots, Offer::new_bool_offer(true)),
            (CapabilityKey::Encryption, Offer::new_bool_offer(encryption)),
            (
                CapabilityKey::ProvisioningType,
                Offer::new_string_offer(["thick", "thin"]),
            ),
        ])
    }

    fn get_volume_opts(
        &self,
        volume: &VolumeConfig,
        pool: &StoragePool,
        requests: &Requests,
    ) -> Result<BTreeMap<String, String>, SanError> {
        self.common.volume_opts(volume, pool, requests)
    }

    fn get_internal_volume_name(&self, name: &str) -> String {
        self.common.internal_volume_name(name)
    }

    fn create_prepare(&self, volume: &mut VolumeConfig) -> bool {
        self.common.create_prepare(volume)
    }

    async fn create_followup(&self, volume: &mut VolumeConfig) -> Result<(), SanError> {
        self.map_lun(volume).await.map(|_| ())
    }

    fn get_protocol(&self) -> Protocol {
        Protocol::Block
    }

    fn get_driver_name(&self) -> &str {
        &self.config().common.storage_driver_name
    }

    fn store_config(&self, persistent: &mut PersistentStorageBackendConfig) {
        self.common.store_config(persistent);
    }

    fn get_external_config(&self) -> serde_json::Value {
        self.common.external_config()
    }

    async fn get_external_volume(&self, name: &str) -> Result<VolumeExternal, SanError> {
        let internal_name = self.get_internal_volume_name(name);
        let attrs = self.common.api().volume_get(&internal_name).await?;

        let snapshot = &attrs.volume_snapshot_attributes;
        let config = VolumeConfig {
            version: VOLUME_CONFIG_VERSION.to_owned(),
            name: name.to_owned(),
            internal_name,
            size: attrs.volume_space_attributes.size_total.to_string(),
            protocol: Protocol::Block,
            snapshot_policy: snapshot.snapshot_policy.clone(),
            export_policy: attrs.volume_export_attributes.policy.clone(),
            snapshot_dir: snapshot.snapdir_access_enabled.to_string(),
            unix_permissions: attrs
                .volume_security_attributes
                .volume_security_unix_attributes
                .permissions
                .clone(),
            storage_class: String::new(),
            access_mode: AccessMode::ReadWriteOnce,
            access_info: VolumeAccessInfo::default(),
            block_size: String::new(),
            file_system: DEFAULT_FILE_SYSTEM.to_owned(),
        };

        Ok(VolumeExternal {
            config,
            backend: self.name().to_owned(),
            pool: attrs.volume_id_attributes.containing_aggregate_name,
        })
    }
}
