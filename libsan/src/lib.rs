//! # libsan: iSCSI storage backend driver for RK8s
//!
//! `libsan` maps LUNs on an ONTAP controller into an initiator group,
//! records how hosts reach them, and logs hosts in to the resulting iSCSI
//! targets.  The controller client and host command execution are traits,
//! so the driver runs against real systems or in-memory fakes alike.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: `VolumeConfig`, access info, pools, backends. |
//! | [`attribute`] | Capability keys, offers and requests. |
//! | [`error`] | [`SanError`] enum covering all failure modes. |
//! | [`config`] | Backend configuration loading, validation and redaction. |
//! | [`api`] | [`ControllerApi`] trait, the controller client boundary. |
//! | [`driver`] | [`StorageDriver`] trait implemented by protocol drivers. |
//! | [`backend`] | Shared driver base and the ONTAP SAN driver. |
//! | [`iscsi`] | Host-side iSCSI discovery and login via `iscsiadm`. |

pub mod api;
pub mod attribute;
pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod iscsi;
pub mod types;

pub use api::ControllerApi;
pub use backend::ontap_san::{LunMapping, OntapSanDriver};
pub use driver::StorageDriver;
pub use error::SanError;
pub use types::*;
