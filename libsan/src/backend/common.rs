//! Behaviour shared by the ONTAP protocol drivers.
//!
//! [`CommonDriver`] owns the driver config, the controller client and the
//! tracing span the driver logs under.  Protocol drivers hold one and
//! delegate the operations that do not depend on the data protocol.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{Span, debug, warn};

use crate::api::ControllerApi;
use crate::attribute::{CapabilityKey, Offers, Request, Requests};
use crate::config::{OntapStorageDriverConfig, PersistentStorageBackendConfig};
use crate::error::SanError;
use crate::types::{StorageBackend, StoragePool, VolumeConfig};

/// Option keys understood by the controller's volume-create call.
pub mod opts {
    pub const AGGREGATE: &str = "aggregate";
    pub const SIZE: &str = "size";
    pub const SPACE_RESERVE: &str = "spaceReserve";
    pub const ENCRYPTION: &str = "encryption";
    pub const SNAPSHOT_POLICY: &str = "snapshotPolicy";
    pub const EXPORT_POLICY: &str = "exportPolicy";
    pub const UNIX_PERMISSIONS: &str = "unixPermissions";
    pub const SNAPSHOT_DIR: &str = "snapshotDir";
}

pub struct CommonDriver {
    config: OntapStorageDriverConfig,
    api: Arc<dyn ControllerApi>,
    span: Span,
}

impl CommonDriver {
    /// `span` is the parent of every event the driver emits.
    pub fn new(config: OntapStorageDriverConfig, api: Arc<dyn ControllerApi>, span: Span) -> Self {
        Self { config, api, span }
    }

    pub fn config(&self) -> &OntapStorageDriverConfig {
        &self.config
    }

    pub fn api(&self) -> &dyn ControllerApi {
        self.api.as_ref()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// `<prefix>_<name>` with characters the controller rejects in volume
    /// names (`-` and `.`) replaced by `_`.  An empty prefix yields the bare
    /// name.
    pub fn internal_volume_name(&self, name: &str) -> String {
        let prefix = self.config.common.storage_prefix();
        let raw = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}_{name}")
        };
        raw.replace(['-', '.'], "_")
    }

    pub fn create_prepare(&self, volume: &mut VolumeConfig) -> bool {
        volume.internal_name = self.internal_volume_name(&volume.name);
        debug!(
            parent: &self.span,
            volume = %volume.name,
            volume_internal = %volume.internal_name,
            "prepared volume for creation",
        );
        true
    }

    /// Attach one pool per configured aggregate, each carrying `attributes`.
    ///
    /// `backend.name` must already be set.
    pub fn backend_specs(&self, backend: &mut StorageBackend, attributes: Offers) {
        let mut pool = StoragePool::new(&self.config.aggregate, &backend.name);
        pool.attributes = attributes;
        backend.storage.insert(pool.name.clone(), pool);
        backend.online = true;
        debug!(
            parent: &self.span,
            backend = %backend.name,
            pools = ?backend.storage.keys().collect::<Vec<_>>(),
            "storage backend specs assembled",
        );
    }

    /// Translate storage-class requests into volume-create options.
    ///
    /// Every request must be satisfied by the pool's offers.
    pub fn volume_opts(
        &self,
        volume: &VolumeConfig,
        pool: &StoragePool,
        requests: &Requests,
    ) -> Result<BTreeMap<String, String>, SanError> {
        let mut options = BTreeMap::new();
        options.insert(opts::AGGREGATE.to_owned(), pool.name.clone());

        for (key, request) in requests {
            if !pool
                .attributes
                .get(key)
                .is_some_and(|offer| offer.matches(request))
            {
                return Err(SanError::InvalidArgument(format!(
                    "pool {} cannot satisfy {key}={request}",
                    pool.name
                )));
            }
            match (key, request) {
                (CapabilityKey::ProvisioningType, Request::String(kind)) => {
                    let reserve = match kind.as_str() {
                        "thin" => "none",
                        "thick" => "volume",
                        other => {
                            return Err(SanError::InvalidArgument(format!(
                                "unsupported provisioning type {other}"
                            )));
                        }
                    };
                    options.insert(opts::SPACE_RESERVE.to_owned(), reserve.to_owned());
                }
                (CapabilityKey::Encryption, Request::Bool(enabled)) => {
                    options.insert(opts::ENCRYPTION.to_owned(), enabled.to_string());
                }
                // Satisfied by picking this pool; nothing to pass on.
                (CapabilityKey::BackendType | CapabilityKey::Snapshots, _) => {}
                (key, request) => {
                    warn!(parent: &self.span, %key, %request, "ignoring request of unexpected kind");
                }
            }
        }

        for (key, value) in [
            (opts::SIZE, &volume.size),
            (opts::SNAPSHOT_POLICY, &volume.snapshot_policy),
            (opts::EXPORT_POLICY, &volume.export_policy),
            (opts::UNIX_PERMISSIONS, &volume.unix_permissions),
            (opts::SNAPSHOT_DIR, &volume.snapshot_dir),
        ] {
            if !value.is_empty() {
                options.insert(key.to_owned(), value.clone());
            }
        }
        Ok(options)
    }

    pub fn store_config(&self, persistent: &mut PersistentStorageBackendConfig) {
        let mut config = self.config.clone();
        config.common.sanitize();
        persistent.ontap_config = Some(config);
    }

    /// The config with credentials redacted, as JSON.
    pub fn external_config(&self) -> serde_json::Value {
        serde_json::to_value(self.config.redacted()).unwrap_or_else(|e| {
            warn!(parent: &self.span, error = %e, "failed to serialize external config");
            serde_json::Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockController;
    use crate::attribute::Offer;
    use crate::config::{CommonStorageDriverConfig, REDACTED};

    fn config() -> OntapStorageDriverConfig {
        OntapStorageDriverConfig {
            data_lif: "10.0.0.1".into(),
            svm: "svm_iscsi".into(),
            username: "admin".into(),
            password: "secret".into(),
            aggregate: "aggr1".into(),
            igroup_name: "trident".into(),
            ..Default::default()
        }
    }

    fn driver_with(config: OntapStorageDriverConfig) -> CommonDriver {
        CommonDriver::new(config, Arc::new(MockController::new()), Span::none())
    }

    fn pool() -> StoragePool {
        let mut pool = StoragePool::new("aggr1", "ontapsan_10.0.0.1");
        pool.attributes = Offers::from([
            (CapabilityKey::Encryption, Offer::new_bool_offer(true)),
            (
                CapabilityKey::ProvisioningType,
                Offer::new_string_offer(["thick", "thin"]),
            ),
            (CapabilityKey::Snapshots, Offer::new_bool_offer(true)),
        ]);
        pool
    }

    #[test]
    fn internal_names() {
        let driver = driver_with(config());
        assert_eq!(driver.internal_volume_name("vol1"), "trident_vol1");
        assert_eq!(
            driver.internal_volume_name("pvc-1a2b.data"),
            "trident_pvc_1a2b_data"
        );

        let driver = driver_with(OntapStorageDriverConfig {
            common: CommonStorageDriverConfig {
                storage_prefix: Some(String::new()),
                ..Default::default()
            },
            ..config()
        });
        assert_eq!(driver.internal_volume_name("vol-1"), "vol_1");

        let driver = driver_with(OntapStorageDriverConfig {
            common: CommonStorageDriverConfig {
                storage_prefix: Some("k8s-prod".into()),
                ..Default::default()
            },
            ..config()
        });
        assert_eq!(driver.internal_volume_name("vol1"), "k8s_prod_vol1");
    }

    #[test]
    fn create_prepare_sets_internal_name() {
        let driver = driver_with(config());
        let mut volume = VolumeConfig {
            name: "vol1".into(),
            ..Default::default()
        };
        assert!(driver.create_prepare(&mut volume));
        assert_eq!(volume.internal_name, "trident_vol1");
    }

    #[test]
    fn thin_encrypted_options() {
        let driver = driver_with(config());
        let volume = VolumeConfig {
            name: "vol1".into(),
            size: "1073741824".into(),
            snapshot_policy: "default".into(),
            snapshot_dir: "false".into(),
            unix_permissions: "0755".into(),
            ..Default::default()
        };
        let requests = Requests::from([
            (CapabilityKey::ProvisioningType, Request::String("thin".into())),
            (CapabilityKey::Encryption, Request::Bool(true)),
            (CapabilityKey::Snapshots, Request::Bool(true)),
        ]);
        let options = driver.volume_opts(&volume, &pool(), &requests).unwrap();
        assert_eq!(
            options,
            BTreeMap::from([
                ("aggregate".to_owned(), "aggr1".to_owned()),
                ("encryption".to_owned(), "true".to_owned()),
                ("size".to_owned(), "1073741824".to_owned()),
                ("snapshotDir".to_owned(), "false".to_owned()),
                ("snapshotPolicy".to_owned(), "default".to_owned()),
                ("spaceReserve".to_owned(), "none".to_owned()),
                ("unixPermissions".to_owned(), "0755".to_owned()),
            ])
        );
    }

    #[test]
    fn thick_options() {
        let driver = driver_with(config());
        let requests = Requests::from([(
            CapabilityKey::ProvisioningType,
            Request::String("thick".into()),
        )]);
        let options = driver
            .volume_opts(&VolumeConfig::default(), &pool(), &requests)
            .unwrap();
        assert_eq!(options["spaceReserve"], "volume");
        assert!(!options.contains_key("encryption"));
        assert!(!options.contains_key("snapshotDir"));
    }

    #[test]
    fn unsatisfiable_request_is_rejected() {
        let driver = driver_with(config());
        let requests = Requests::from([(
            CapabilityKey::ProvisioningType,
            Request::String("compressed".into()),
        )]);
        let err = driver
            .volume_opts(&VolumeConfig::default(), &pool(), &requests)
            .unwrap_err();
        assert!(matches!(err, SanError::InvalidArgument(_)));

        // The pool does not advertise a backend type at all.
        let requests = Requests::from([(
            CapabilityKey::BackendType,
            Request::String("ontap-san".into()),
        )]);
        assert!(
            driver
                .volume_opts(&VolumeConfig::default(), &pool(), &requests)
                .is_err()
        );
    }

    #[test]
    fn backend_specs_adds_aggregate_pool() {
        let driver = driver_with(config());
        let mut backend = StorageBackend {
            name: "ontapsan_10.0.0.1".into(),
            ..Default::default()
        };
        let offers = Offers::from([(CapabilityKey::Snapshots, Offer::new_bool_offer(true))]);
        driver.backend_specs(&mut backend, offers.clone());

        assert!(backend.online);
        let pool = &backend.storage["aggr1"];
        assert_eq!(pool.backend, "ontapsan_10.0.0.1");
        assert_eq!(pool.attributes, offers);
    }

    #[test]
    fn stored_config_is_sanitized() {
        let driver = driver_with(config());
        let mut persistent = PersistentStorageBackendConfig::default();
        driver.store_config(&mut persistent);
        let stored = persistent.ontap_config.expect("stored");
        assert_eq!(stored.common.storage_prefix.as_deref(), Some("trident"));
        assert_eq!(stored.svm, "svm_iscsi");
        // The driver's own copy is untouched.
        assert!(driver.config().common.storage_prefix.is_none());
    }

    #[test]
    fn external_config_redacts_credentials() {
        let driver = driver_with(config());
        let external = driver.external_config();
        assert_eq!(external["username"], REDACTED);
        assert_eq!(external["password"], REDACTED);
        assert_eq!(external["dataLIF"], "10.0.0.1");
        assert_eq!(external["storageDriverName"], "ontap-san");
    }
}
