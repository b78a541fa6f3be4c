//! Backend configuration for the ONTAP SAN driver.
//!
//! A backend is described by a JSON document using the same keys operators
//! already write for ONTAP backends:
//!
//! ```json
//! {
//!   "version": 1,
//!   "storageDriverName": "ontap-san",
//!   "managementLIF": "10.0.0.10",
//!   "dataLIF": "10.0.0.1",
//!   "svm": "svm_iscsi",
//!   "username": "admin",
//!   "password": "secret",
//!   "aggregate": "aggr1",
//!   "igroupName": "trident"
//! }
//! ```
//!
//! The config is validated once on load and then treated as immutable for
//! the lifetime of the driver.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SanError;

/// Driver name for iSCSI backends on ONTAP.
pub const ONTAP_SAN_STORAGE_DRIVER_NAME: &str = "ontap-san";

/// Prefix prepended to internal volume names when none is configured.
pub const DEFAULT_STORAGE_PREFIX: &str = "trident";

/// Placeholder written over credentials in externally visible configs.
pub const REDACTED: &str = "<REDACTED>";

const CONFIG_VERSION: u32 = 1;

/// Settings every storage driver understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommonStorageDriverConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_driver_name")]
    pub storage_driver_name: String,
    /// `None` means [`DEFAULT_STORAGE_PREFIX`]; `Some("")` disables prefixing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_prefix: Option<String>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_driver_name() -> String {
    ONTAP_SAN_STORAGE_DRIVER_NAME.to_owned()
}

impl Default for CommonStorageDriverConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage_driver_name: default_driver_name(),
            storage_prefix: None,
        }
    }
}

impl CommonStorageDriverConfig {
    /// The effective prefix for internal volume names.
    pub fn storage_prefix(&self) -> &str {
        self.storage_prefix.as_deref().unwrap_or(DEFAULT_STORAGE_PREFIX)
    }

    /// Resolve defaults so a persisted copy is self-describing.
    pub fn sanitize(&mut self) {
        if self.storage_prefix.is_none() {
            self.storage_prefix = Some(DEFAULT_STORAGE_PREFIX.to_owned());
        }
    }

    fn validate(&self) -> Result<(), SanError> {
        if self.version != CONFIG_VERSION {
            return Err(SanError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if let Some(prefix) = &self.storage_prefix
            && !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SanError::InvalidConfig(format!(
                "storage prefix {prefix:?} may only contain letters, digits, '_' and '-'"
            )));
        }
        Ok(())
    }
}

/// Connection and placement settings for an ONTAP iSCSI backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OntapStorageDriverConfig {
    #[serde(flatten)]
    pub common: CommonStorageDriverConfig,
    /// Address of the cluster or SVM management interface.
    #[serde(rename = "managementLIF", default)]
    pub management_lif: String,
    /// Address hosts use as the iSCSI portal.
    #[serde(rename = "dataLIF")]
    pub data_lif: String,
    /// Storage virtual machine owning the volumes and the iSCSI service.
    pub svm: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Aggregate new volumes are placed in; advertised as the backend's pool.
    #[serde(default)]
    pub aggregate: String,
    /// Initiator group LUNs are mapped into.
    pub igroup_name: String,
}

impl OntapStorageDriverConfig {
    /// Parse and validate a config document.
    pub fn from_json(json: &str) -> Result<Self, SanError> {
        let config: Self = serde_json::from_str(json).map_err(SanError::config)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the config file at `path`.
    pub async fn load(path: &Path) -> Result<Self, SanError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            SanError::InvalidConfig(format!("read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), SanError> {
        self.common.validate()?;
        if self.common.storage_driver_name != ONTAP_SAN_STORAGE_DRIVER_NAME {
            return Err(SanError::InvalidConfig(format!(
                "storage driver {:?} is not {ONTAP_SAN_STORAGE_DRIVER_NAME}",
                self.common.storage_driver_name
            )));
        }
        for (key, value) in [
            ("dataLIF", &self.data_lif),
            ("svm", &self.svm),
            ("aggregate", &self.aggregate),
            ("igroupName", &self.igroup_name),
        ] {
            if value.trim().is_empty() {
                return Err(SanError::InvalidConfig(format!("{key} is required")));
            }
        }
        Ok(())
    }

    /// A copy with credentials replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.username.is_empty() {
            config.username = REDACTED.to_owned();
        }
        if !config.password.is_empty() {
            config.password = REDACTED.to_owned();
        }
        config
    }
}

/// Driver configs as stored by the backend registry.
///
/// Exactly one field is populated per backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentStorageBackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontap_config: Option<OntapStorageDriverConfig>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"{
        "version": 1,
        "storageDriverName": "ontap-san",
        "managementLIF": "10.0.0.10",
        "dataLIF": "10.0.0.1",
        "svm": "svm_iscsi",
        "username": "admin",
        "password": "secret",
        "aggregate": "aggr1",
        "igroupName": "trident"
    }"#;

    #[test]
    fn parse_config() {
        let config = OntapStorageDriverConfig::from_json(CONFIG).expect("parse");
        assert_eq!(config.common.storage_driver_name, "ontap-san");
        assert_eq!(config.management_lif, "10.0.0.10");
        assert_eq!(config.data_lif, "10.0.0.1");
        assert_eq!(config.igroup_name, "trident");
        assert_eq!(config.common.storage_prefix(), DEFAULT_STORAGE_PREFIX);
    }

    #[test]
    fn missing_required_field() {
        let json = CONFIG.replace(r#""svm": "svm_iscsi","#, r#""svm": "","#);
        let err = OntapStorageDriverConfig::from_json(&json).unwrap_err();
        assert_eq!(err, SanError::InvalidConfig("svm is required".into()));

        let json = CONFIG.replace(r#""igroupName": "trident""#, r#""storagePrefix": "k8s""#);
        assert!(matches!(
            OntapStorageDriverConfig::from_json(&json),
            Err(SanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn wrong_driver_name() {
        let json = CONFIG.replace("ontap-san", "ontap-nas");
        let err = OntapStorageDriverConfig::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("ontap-nas"));
    }

    #[test]
    fn bad_prefix() {
        let json = CONFIG.replace(r#""version": 1,"#, r#""version": 1, "storagePrefix": "a/b","#);
        assert!(matches!(
            OntapStorageDriverConfig::from_json(&json),
            Err(SanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unsupported_version() {
        let json = CONFIG.replace(r#""version": 1"#, r#""version": 2"#);
        assert!(OntapStorageDriverConfig::from_json(&json).is_err());
    }

    #[test]
    fn redaction_hides_credentials() {
        let config = OntapStorageDriverConfig::from_json(CONFIG).expect("parse");
        let redacted = config.redacted();
        assert_eq!(redacted.username, REDACTED);
        assert_eq!(redacted.password, REDACTED);
        assert_eq!(redacted.data_lif, config.data_lif);
        // The source config keeps its credentials.
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn sanitize_resolves_prefix() {
        let mut common = CommonStorageDriverConfig::default();
        common.sanitize();
        assert_eq!(common.storage_prefix.as_deref(), Some(DEFAULT_STORAGE_PREFIX));

        let mut common = CommonStorageDriverConfig {
            storage_prefix: Some(String::new()),
            ..Default::default()
        };
        common.sanitize();
        assert_eq!(common.storage_prefix(), "");
    }

    #[tokio::test]
    async fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = OntapStorageDriverConfig::load(file.path()).await.unwrap();
        assert_eq!(config.svm, "svm_iscsi");
    }

    #[tokio::test]
    async fn load_missing_file() {
        let err = OntapStorageDriverConfig::load(Path::new("/nonexistent/backend.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, SanError::InvalidConfig(_)));
    }
}
