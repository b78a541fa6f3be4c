//! Errors raised by the SAN driver.
//!
//! Controller calls, host commands and config loading all fail with a
//! [`SanError`].  Errors are plain data: they can be cloned, compared in
//! tests and serialized into a backend's status record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for SAN driver operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum SanError {
    /// A controller API call failed at the transport level or returned a
    /// non-success status in its response envelope.
    #[error("{operation} failed: {reason}")]
    Controller {
        /// Name of the controller operation, e.g. `iscsi-service-get-iter`.
        operation: String,
        /// Human-readable failure reason reported by the client.
        reason: String,
    },

    /// The requested volume does not exist on the controller.
    #[error("volume {0} not found")]
    VolumeNotFound(String),

    /// A host command could not be started at all.
    #[error("could not run {command}: {reason}")]
    CommandLaunch {
        /// The command line that was attempted.
        command: String,
        /// Why the process could not be spawned.
        reason: String,
    },

    /// A host command ran and exited unsuccessfully.
    #[error("{command} exited with {}: {output}", exit_label(.code))]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        code: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },

    /// The backend configuration is unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| c.to_string())
}

impl SanError {
    /// Create a [`SanError::Controller`] for `operation` from anything that
    /// implements [`std::fmt::Display`].
    pub fn controller<E: std::fmt::Display>(operation: &str, e: E) -> Self {
        Self::Controller {
            operation: operation.to_owned(),
            reason: e.to_string(),
        }
    }

    /// Create a [`SanError::InvalidConfig`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidConfig(e.to_string())
    }

    /// Create a [`SanError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SanError::VolumeNotFound("trident_vol1".into());
        assert_eq!(err.to_string(), "volume trident_vol1 not found");

        let err = SanError::controller("lun-map", "igroup does not exist");
        assert_eq!(err.to_string(), "lun-map failed: igroup does not exist");
    }

    #[test]
    fn command_failed_display() {
        let err = SanError::CommandFailed {
            command: "iscsiadm -m node -p 10.0.0.1 --login".into(),
            code: Some(21),
            output: "no records found".into(),
        };
        assert_eq!(
            err.to_string(),
            "iscsiadm -m node -p 10.0.0.1 --login exited with 21: no records found"
        );

        let err = SanError::CommandFailed {
            command: "iscsiadm".into(),
            code: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("exited with signal"));
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = SanError::Controller {
            operation: "iscsi-service-get-iter".into(),
            reason: "status failed, errno 13005".into(),
        };
        let json = serde_json::to_string(&err).expect("serialize");
        let de: SanError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err, de);
    }
}
