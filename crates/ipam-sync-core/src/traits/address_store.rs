// # Address Store Trait
//
// Defines the interface to the IPAM system of record.
//
// ## Purpose
//
// The store owns prefixes and address records. The reconciler reads both
// once per run and then issues one mutation per decision.
//
// ## Implementations
//
// - NetBox: `ipam-sync-netbox` crate
// - In-memory: `MemoryAddressStore` (tests, embedding)

use async_trait::async_trait;

use crate::model::{AddressRecord, NewAddressRecord, Prefix, RecordUpdate};

/// Trait for IPAM store implementations
///
/// # Trust Level: Untrusted
///
/// - ✅ Perform HTTP/HTTPS calls to the IPAM API only
/// - ✅ Drain pagination before returning from the list calls
/// - ✅ Reject duplicate or invalid writes with `Error::Validation`
/// - ❌ Retry or back off
/// - ❌ Decide whether a record should change (owned by `Reconciler`)
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// List all prefixes
    ///
    /// Prefixes whose CIDR cannot be parsed should be dropped by the
    /// implementation rather than failing the call.
    async fn list_prefixes(&self) -> Result<Vec<Prefix>, crate::Error>;

    /// List all address records
    async fn list_address_records(&self) -> Result<Vec<AddressRecord>, crate::Error>;

    /// Create an address record
    ///
    /// # Returns
    ///
    /// - `Ok(AddressRecord)`: The created record, with its store-assigned id
    /// - `Err(Error::Validation)`: Duplicate address or invalid payload
    async fn create_address_record(
        &self,
        record: &NewAddressRecord,
    ) -> Result<AddressRecord, crate::Error>;

    /// Apply a partial update to an existing record
    async fn update_address_record(
        &self,
        id: u64,
        update: &RecordUpdate,
    ) -> Result<(), crate::Error>;

    /// Delete an address record
    async fn delete_address_record(&self, id: u64) -> Result<(), crate::Error>;

    /// Store name (for logging)
    fn store_name(&self) -> &'static str;
}
