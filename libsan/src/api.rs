//! Controller API boundary.
//!
//! The SAN driver never speaks the controller's management protocol itself.
//! It drives an implementation of [`ControllerApi`], which issues the calls
//! and hands back parsed records.  Only the calls the driver needs are part
//! of the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SanError;

/// Optional controller features that can be probed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiFeature {
    /// Volume-level encryption at rest.
    VolumeEncryption,
}

/// Status value the controller reports for a successful call.
pub const RESULT_STATUS_PASSED: &str = "passed";

/// Status envelope attached to every controller response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStatus {
    /// `"passed"` or `"failed"`.
    pub status: String,
    #[serde(default)]
    pub errno: String,
    #[serde(default)]
    pub reason: String,
}

impl ResultStatus {
    pub fn passed() -> Self {
        Self {
            status: RESULT_STATUS_PASSED.to_owned(),
            ..Default::default()
        }
    }

    pub fn failed(errno: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: "failed".to_owned(),
            errno: errno.into(),
            reason: reason.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == RESULT_STATUS_PASSED
    }
}

/// One iSCSI service endpoint on the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiServiceInfo {
    /// Storage virtual machine that owns the service.
    pub vserver: String,
    /// Target node IQN.
    pub node_name: String,
    /// Whether the service is running and accepting logins.
    #[serde(default)]
    pub is_available: bool,
}

/// Response to an iSCSI service listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiServiceResponse {
    pub result: ResultStatus,
    #[serde(default)]
    pub attributes_list: Vec<IscsiServiceInfo>,
}

// ---------------------------------------------------------------------------
// Volume attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeExportAttributes {
    /// Export policy name.
    pub policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeIdAttributes {
    pub name: String,
    pub containing_aggregate_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSecurityUnixAttributes {
    /// Octal permission bits, e.g. `"0755"`.
    pub permissions: String,
    #[serde(default)]
    pub user_id: u32,
    #[serde(default)]
    pub group_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSecurityAttributes {
    pub volume_security_unix_attributes: VolumeSecurityUnixAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpaceAttributes {
    /// Total size in bytes.
    pub size_total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotAttributes {
    pub snapshot_policy: String,
    pub snapdir_access_enabled: bool,
}

/// The attribute set the controller reports for one volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttributes {
    pub volume_export_attributes: VolumeExportAttributes,
    pub volume_id_attributes: VolumeIdAttributes,
    pub volume_security_attributes: VolumeSecurityAttributes,
    pub volume_space_attributes: VolumeSpaceAttributes,
    pub volume_snapshot_attributes: VolumeSnapshotAttributes,
}

// ---------------------------------------------------------------------------
// ControllerApi
// ---------------------------------------------------------------------------

/// Controller calls used by the SAN driver.
///
/// Implementations must be safe to call concurrently for distinct volumes.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Whether the controller supports `feature`.
    ///
    /// Clients that cannot determine support report `false`.
    async fn supports_feature(&self, feature: ApiFeature) -> bool;

    /// List the iSCSI services across the whole controller, stopped ones
    /// included; callers filter on [`IscsiServiceInfo::is_available`].
    ///
    /// Transport failures are returned as `Err`; controller-side failures are
    /// reported in [`IscsiServiceResponse::result`].
    async fn iscsi_service_get_iter(&self) -> Result<IscsiServiceResponse, SanError>;

    /// Map the LUN at `lun_path` into `igroup` unless it is already mapped
    /// there, returning the LUN id of the (new or existing) mapping.
    async fn lun_map_if_not_mapped(&self, igroup: &str, lun_path: &str) -> Result<u16, SanError>;

    /// Fetch the attributes of the volume named `name`.
    ///
    /// Returns [`SanError::VolumeNotFound`] when the volume does not exist.
    async fn volume_get(&self, name: &str) -> Result<VolumeAttributes, SanError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_status() {
        assert!(ResultStatus::passed().is_passed());
        let failed = ResultStatus::failed("13005", "unable to find API");
        assert!(!failed.is_passed());
        assert_eq!(failed.errno, "13005");
        assert!(!ResultStatus::default().is_passed());
    }

    #[test]
    fn volume_attributes_from_json() {
        let attrs: VolumeAttributes = serde_json::from_str(
            r#"{
                "volumeExportAttributes": {"policy": "default"},
                "volumeIdAttributes": {"name": "trident_vol1", "containingAggregateName": "aggr1"},
                "volumeSecurityAttributes": {"volumeSecurityUnixAttributes": {"permissions": "0755"}},
                "volumeSpaceAttributes": {"sizeTotal": 10737418240},
                "volumeSnapshotAttributes": {"snapshotPolicy": "none", "snapdirAccessEnabled": false}
            }"#,
        )
        .expect("parse");
        assert_eq!(attrs.volume_space_attributes.size_total, 10_737_418_240);
        assert_eq!(
            attrs
                .volume_security_attributes
                .volume_security_unix_attributes
                .permissions,
            "0755"
        );
        assert_eq!(attrs.volume_id_attributes.containing_aggregate_name, "aggr1");
    }

    #[tokio::test]
    async fn mock_mapping_is_idempotent() {
        let api = mock::MockController::new();
        let first = api.lun_map_if_not_mapped("ig", "/vol/a/lun0").await.unwrap();
        let second = api.lun_map_if_not_mapped("ig", "/vol/b/lun0").await.unwrap();
        let again = api.lun_map_if_not_mapped("ig", "/vol/a/lun0").await.unwrap();
        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(api.mappings.lock().unwrap().len(), 2);
    }
}
