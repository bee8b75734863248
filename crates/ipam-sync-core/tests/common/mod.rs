//! Test doubles and common utilities for reconciliation contract tests

#![allow(dead_code)]

use ipam_sync_core::error::{Error, Result};
use ipam_sync_core::model::{
    AddressRecord, ClientObservation, Network, NewAddressRecord, Prefix, RecordUpdate, Status,
};
use ipam_sync_core::{AddressStore, MemoryAddressStore, ObservationSource, SyncConfig};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An ObservationSource that replays canned networks and clients
pub struct ScriptedSource {
    networks: Option<Vec<Network>>,
    clients: HashMap<String, Vec<ClientObservation>>,
    failing_networks: HashSet<String>,
    list_clients_calls: Arc<std::sync::Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            networks: Some(Vec::new()),
            clients: HashMap::new(),
            failing_networks: HashSet::new(),
            list_clients_calls: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// A source whose network listing always fails
    pub fn unreachable() -> Self {
        Self {
            networks: None,
            ..Self::new()
        }
    }

    /// Add a network with its observed clients
    pub fn with_network(mut self, id: &str, tags: &[&str], clients: Vec<ClientObservation>) -> Self {
        if let Some(networks) = self.networks.as_mut() {
            networks.push(Network {
                id: id.to_string(),
                name: format!("net-{}", id),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            });
        }
        self.clients.insert(id.to_string(), clients);
        self
    }

    /// Make list_clients fail for a network
    pub fn failing_clients(mut self, id: &str) -> Self {
        self.failing_networks.insert(id.to_string());
        self
    }

    /// Shared handle to the network ids list_clients was called with
    pub fn calls(&self) -> Arc<std::sync::Mutex<Vec<String>>> {
        Arc::clone(&self.list_clients_calls)
    }
}

#[async_trait::async_trait]
impl ObservationSource for ScriptedSource {
    async fn list_networks(&self, _organization_id: &str) -> Result<Vec<Network>> {
        self.networks
            .clone()
            .ok_or_else(|| Error::auth("Invalid API key"))
    }

    async fn list_clients(&self, network_id: &str, _timespan_secs: u64) -> Result<Vec<ClientObservation>> {
        self.list_clients_calls
            .lock()
            .unwrap()
            .push(network_id.to_string());

        if self.failing_networks.contains(network_id) {
            return Err(Error::provider("scripted", "500 Internal Server Error"));
        }
        Ok(self.clients.get(network_id).cloned().unwrap_or_default())
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// An AddressStore wrapper that fails writes for chosen addresses
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryAddressStore,
    fail_addresses: Arc<HashSet<String>>,
    fail_listing: bool,
    writes: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryAddressStore, fail_addresses: &[&str]) -> Self {
        Self {
            inner,
            fail_addresses: Arc::new(fail_addresses.iter().map(|a| a.to_string()).collect()),
            fail_listing: false,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A store whose list calls fail
    pub fn unreachable(inner: MemoryAddressStore) -> Self {
        Self {
            fail_listing: true,
            ..Self::new(inner, &[])
        }
    }

    /// Number of write calls attempted (create, update, delete)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn address_of(&self, id: u64) -> Option<String> {
        self.inner
            .records()
            .await
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| r.address)
    }

    async fn check(&self, address: Option<&str>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        match address {
            Some(address) if self.fail_addresses.contains(address) => {
                Err(Error::provider("flaky", format!("503 for {}", address)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl AddressStore for FlakyStore {
    async fn list_prefixes(&self) -> Result<Vec<Prefix>> {
        if self.fail_listing {
            return Err(Error::http("connection refused"));
        }
        self.inner.list_prefixes().await
    }

    async fn list_address_records(&self) -> Result<Vec<AddressRecord>> {
        if self.fail_listing {
            return Err(Error::http("connection refused"));
        }
        self.inner.list_address_records().await
    }

    async fn create_address_record(&self, record: &NewAddressRecord) -> Result<AddressRecord> {
        self.check(Some(record.address.as_str())).await?;
        self.inner.create_address_record(record).await
    }

    async fn update_address_record(&self, id: u64, update: &RecordUpdate) -> Result<()> {
        let address = self.address_of(id).await;
        self.check(address.as_deref()).await?;
        self.inner.update_address_record(id, update).await
    }

    async fn delete_address_record(&self, id: u64) -> Result<()> {
        let address = self.address_of(id).await;
        self.check(address.as_deref()).await?;
        self.inner.delete_address_record(id).await
    }

    fn store_name(&self) -> &'static str {
        "flaky"
    }
}

pub fn observation(ip: &str, mac: &str, last_seen: &str) -> ClientObservation {
    ClientObservation {
        ip: if ip.is_empty() { None } else { Some(ip.to_string()) },
        mac: mac.to_string(),
        last_seen: last_seen.to_string(),
        description: None,
    }
}

pub fn record(id: u64, address: &str, status: Status, tags: &[&str], last_seen: Option<&str>) -> AddressRecord {
    let mut custom_fields = BTreeMap::new();
    if let Some(last_seen) = last_seen {
        custom_fields.insert("last_seen".to_string(), serde_json::json!(last_seen));
    }
    custom_fields.insert("mac".to_string(), serde_json::json!("00:11:22:33:44:55"));

    AddressRecord {
        id,
        address: address.to_string(),
        status,
        tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        custom_fields,
        description: String::new(),
    }
}

/// A memory store seeded with the given active/inactive prefixes
pub async fn store_with_prefixes(prefixes: &[(&str, &str)]) -> MemoryAddressStore {
    let store = MemoryAddressStore::new();
    for (cidr, status) in prefixes {
        store.add_prefix(Prefix::new(cidr.parse().unwrap(), *status)).await;
    }
    store
}

/// Helper to create a minimal SyncConfig for testing
pub fn test_config() -> SyncConfig {
    SyncConfig::new("572081")
}

pub const OPT_IN: &str = "discover-clients";
