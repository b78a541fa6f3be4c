//! Capability attributes: what a backend offers and what a volume requests.
//!
//! A backend advertises one [`Offer`] per [`CapabilityKey`]; the provisioning
//! layer compares them with the [`Request`]s derived from a storage class.
//! Offers are keyed by the enum in an ordered map, so a key can never appear
//! twice.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed set of capabilities a SAN backend can advertise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityKey {
    /// Name of the driver serving the backend.
    BackendType,
    /// Whether volumes support snapshots.
    Snapshots,
    /// Whether volumes can be encrypted at rest.
    Encryption,
    /// `thick` and/or `thin` provisioning.
    ProvisioningType,
}

impl CapabilityKey {
    /// Every key, in advertisement order.
    pub const ALL: [CapabilityKey; 4] = [
        Self::BackendType,
        Self::Snapshots,
        Self::Encryption,
        Self::ProvisioningType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendType => "backendType",
            Self::Snapshots => "snapshots",
            Self::Encryption => "encryption",
            Self::ProvisioningType => "provisioningType",
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value set a backend is able to satisfy for one capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type", content = "offer")]
pub enum Offer {
    Bool(bool),
    String(BTreeSet<String>),
}

impl Offer {
    pub fn new_bool_offer(value: bool) -> Self {
        Self::Bool(value)
    }

    pub fn new_string_offer<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::String(values.into_iter().map(Into::into).collect())
    }

    /// `true` if this offer carries no usable value.
    ///
    /// A bool offer always carries one.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bool(_) => false,
            Self::String(values) => values.is_empty(),
        }
    }

    /// Whether the offer satisfies `request`.
    ///
    /// A bool offer satisfies any `false` request and a `true` request only
    /// when it offers `true`.  A string offer satisfies a request whose value
    /// it contains.  Mismatched kinds never match.
    pub fn matches(&self, request: &Request) -> bool {
        match (self, request) {
            (Self::Bool(offered), Request::Bool(requested)) => *offered || !*requested,
            (Self::String(offered), Request::String(requested)) => offered.contains(requested),
            _ => false,
        }
    }
}

/// A single value asked for by a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Request {
    Bool(bool),
    String(String),
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Offers keyed by capability.
pub type Offers = BTreeMap<CapabilityKey, Offer>;

/// Requests keyed by capability.
pub type Requests = BTreeMap<CapabilityKey, Request>;
