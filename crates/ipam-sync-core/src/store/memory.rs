// # Memory Address Store
//
// In-memory implementation of AddressStore.
//
// ## Purpose
//
// Holds prefixes and address records in process memory with the same
// write rules a real IPAM enforces: one record per address, store-assigned
// ids, custom fields merged on update. Useful for tests and for embedding
// the reconciler without an IPAM server.
//
// ## Crash Behavior
//
// - All state is lost on restart
// - Nothing is persisted

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{AddressRecord, NewAddressRecord, Prefix, RecordUpdate};
use crate::snapshot::address_key;
use crate::traits::AddressStore;

#[derive(Debug, Default)]
struct Inner {
    prefixes: Vec<Prefix>,
    records: Vec<AddressRecord>,
    next_id: u64,
}

/// In-memory address store implementation
///
/// Cloning yields another handle to the same data, so a test can keep one
/// handle for assertions while the reconciler owns another.
///
/// # Example
///
/// ```rust,no_run
/// use ipam_sync_core::{AddressStore, MemoryAddressStore, Prefix};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryAddressStore::new();
///     store.add_prefix(Prefix::new("10.0.0.0/24".parse()?, "active")).await;
///
///     let prefixes = store.list_prefixes().await?;
///     assert_eq!(prefixes.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryAddressStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_prefix(&self, prefix: Prefix) {
        self.inner.write().await.prefixes.push(prefix);
    }

    /// Seed a record as if it pre-existed; its id is kept and the id counter
    /// moves past it
    pub async fn insert_record(&self, record: AddressRecord) {
        let mut guard = self.inner.write().await;
        guard.next_id = guard.next_id.max(record.id);
        guard.records.push(record);
    }

    /// Copy of all records, in insertion order
    pub async fn records(&self) -> Vec<AddressRecord> {
        self.inner.read().await.records.clone()
    }

    /// Record stored at exactly `address`
    pub async fn record_at(&self, address: &str) -> Option<AddressRecord> {
        let key = address_key(address);
        let guard = self.inner.read().await;
        guard
            .records
            .iter()
            .find(|r| address_key(&r.address) == key)
            .cloned()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the store has no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn list_prefixes(&self) -> Result<Vec<Prefix>, Error> {
        Ok(self.inner.read().await.prefixes.clone())
    }

    async fn list_address_records(&self) -> Result<Vec<AddressRecord>, Error> {
        Ok(self.inner.read().await.records.clone())
    }

    async fn create_address_record(&self, record: &NewAddressRecord) -> Result<AddressRecord, Error> {
        let key = address_key(&record.address);
        let mut guard = self.inner.write().await;

        if guard.records.iter().any(|r| address_key(&r.address) == key) {
            return Err(Error::validation(format!(
                "Duplicate IP address found in global table: {}",
                record.address
            )));
        }

        guard.next_id += 1;
        let created = AddressRecord {
            id: guard.next_id,
            address: record.address.clone(),
            status: record.status.clone(),
            tags: record.tags.clone(),
            custom_fields: record.custom_fields.clone(),
            description: record.description.clone(),
        };
        guard.records.push(created.clone());

        Ok(created)
    }

    async fn update_address_record(&self, id: u64, update: &RecordUpdate) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let record = guard
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found(format!("Address record {}", id)))?;
        record.apply(update);
        Ok(())
    }

    async fn delete_address_record(&self, id: u64) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let before = guard.records.len();
        guard.records.retain(|r| r.id != id);
        if guard.records.len() == before {
            return Err(Error::not_found(format!("Address record {}", id)));
        }
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
