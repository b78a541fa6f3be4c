//! Storage backend drivers.
//!
//! Each protocol driver owns a [`common::CommonDriver`] and implements
//! [`StorageDriver`](crate::driver::StorageDriver) on top of it.

pub mod common;
pub mod ontap_san;
