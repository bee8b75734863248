//! Domain types shared by the reconciler and its collaborators

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Custom field holding the date a record was last observed (`%Y-%m-%d`)
pub const LAST_SEEN_FIELD: &str = "last_seen";

/// Custom field holding the MAC address of the observed client
pub const MAC_FIELD: &str = "mac";

/// Lifecycle status of a prefix or address record
///
/// Only `active` and `reserved` carry meaning for reconciliation; any other
/// value the store uses is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Active,
    Reserved,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Active => "active",
            Status::Reserved => "reserved",
            Status::Other(value) => value,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active)
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "active" => Status::Active,
            "reserved" => Status::Reserved,
            _ => Status::Other(value),
        }
    }
}

impl From<&str> for Status {
    fn from(value: &str) -> Self {
        Status::from(value.to_string())
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous address block, read-only to the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefix {
    pub cidr: IpNet,
    pub status: Status,
}

impl Prefix {
    pub fn new(cidr: IpNet, status: impl Into<Status>) -> Self {
        Self {
            cidr,
            status: status.into(),
        }
    }
}

/// A network in the controller organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Network {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// One sighting of a client within the observation window
///
/// Field values of the wrong JSON type deserialize as missing, so one bad
/// client never fails the page it arrived on. The reconciler then drops
/// that observation on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientObservation {
    #[serde(default, deserialize_with = "string_or_none")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub mac: String,
    /// Controller timestamp, `%Y-%m-%dT%H:%M:%SZ`; empty when not reported
    #[serde(rename = "lastSeen", default, deserialize_with = "string_or_empty")]
    pub last_seen: String,
    #[serde(default, deserialize_with = "string_or_none")]
    pub description: Option<String>,
}

fn string_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Some(value),
        _ => None,
    })
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(string_or_none(deserializer)?.unwrap_or_default())
}

impl ClientObservation {
    /// The IP address, if the controller reported a non-empty one
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty())
    }
}

/// An IPAM record for one fully-qualified address (`ip/len`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: u64,
    pub address: String,
    pub status: Status,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
}

impl AddressRecord {
    /// Whether this record was created by the sync (carries the provenance tag)
    pub fn is_discovered(&self, discovered_tag: &str) -> bool {
        self.tags.contains(discovered_tag)
    }

    /// The `last_seen` custom field, when present and a string
    pub fn last_seen(&self) -> Option<&str> {
        self.custom_fields.get(LAST_SEEN_FIELD)?.as_str()
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(status) = &update.status {
            self.status = status.clone();
        }
        if let Some(fields) = &update.custom_fields {
            for (key, value) in fields {
                self.custom_fields.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Payload for creating an address record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAddressRecord {
    pub address: String,
    pub status: Status,
    pub description: String,
    pub custom_fields: BTreeMap<String, serde_json::Value>,
    pub tags: BTreeSet<String>,
}

/// Partial update for an existing address record
///
/// Custom fields are merged key by key; fields left `None` are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, serde_json::Value>>,
}

impl RecordUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            custom_fields: None,
        }
    }
}
