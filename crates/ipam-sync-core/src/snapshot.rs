//! Per-run view of the address store
//!
//! A [`RunSnapshot`] is built once at the start of a run from
//! `list_prefixes()` and `list_address_records()` and discarded when the run
//! ends. It is never re-fetched mid-run. The [`AddressIndex`] does apply the
//! run's own writes so that a record created early in discovery is found by
//! later lookups and by the expiration sweep.

use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::PrefixMatchPolicy;
use crate::error::{Error, Result};
use crate::model::{AddressRecord, Prefix, RecordUpdate};

/// Prefix matcher over the active prefixes of a run
#[derive(Debug, Clone)]
pub struct PrefixTable {
    prefixes: Vec<Prefix>,
    policy: PrefixMatchPolicy,
}

impl PrefixTable {
    pub fn new(prefixes: Vec<Prefix>, policy: PrefixMatchPolicy) -> Self {
        Self { prefixes, policy }
    }

    /// Find the mask length of the active prefix containing `ip`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(len))`: A matching active prefix was found
    /// - `Ok(None)`: No active prefix contains the address
    /// - `Err(Error::InvalidInput)`: `ip` is not an IP address
    pub fn find_prefix_for(&self, ip: &str) -> Result<Option<u8>> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("Invalid IP address: '{}'", ip)))?;

        let mut candidates = self
            .prefixes
            .iter()
            .filter(|p| p.status.is_active() && p.cidr.contains(&addr));

        let matched = match self.policy {
            PrefixMatchPolicy::First => candidates.next(),
            // max_by_key keeps the last maximum; fold keeps the first
            PrefixMatchPolicy::Longest => candidates.fold(None, |best: Option<&Prefix>, p| match best {
                Some(b) if b.cidr.prefix_len() >= p.cidr.prefix_len() => Some(b),
                _ => Some(p),
            }),
        };

        Ok(matched.map(|p| p.cidr.prefix_len()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Normalize an `ip/len` string for exact-match lookups
///
/// Unparseable addresses are kept verbatim so they still index by equality.
pub fn address_key(address: &str) -> String {
    let trimmed = address.trim();
    match trimmed.parse::<IpNet>() {
        Ok(net) => net.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Address records of a run, indexed by exact address
#[derive(Debug, Clone, Default)]
pub struct AddressIndex {
    slots: Vec<Option<AddressRecord>>,
    by_address: HashMap<String, usize>,
    by_id: HashMap<u64, usize>,
}

impl AddressIndex {
    pub fn new(records: Vec<AddressRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Find the record stored at exactly `address`
    pub fn find_record_for(&self, address: &str) -> Option<&AddressRecord> {
        let slot = *self.by_address.get(&address_key(address))?;
        self.slots[slot].as_ref()
    }

    /// Add a record; an earlier record at the same address keeps the lookup
    pub fn insert(&mut self, record: AddressRecord) {
        let slot = self.slots.len();
        let key = address_key(&record.address);

        if self.by_address.contains_key(&key) {
            warn!(
                "Duplicate address record {} (id {}), lookups use the first",
                record.address, record.id
            );
        } else {
            self.by_address.insert(key, slot);
        }

        self.by_id.insert(record.id, slot);
        self.slots.push(Some(record));
    }

    /// Mirror a successful store update
    pub fn apply_update(&mut self, id: u64, update: &RecordUpdate) {
        if let Some(&slot) = self.by_id.get(&id)
            && let Some(record) = self.slots[slot].as_mut()
        {
            record.apply(update);
        }
    }

    /// Mirror a successful store delete
    pub fn remove(&mut self, id: u64) -> Option<AddressRecord> {
        let slot = self.by_id.remove(&id)?;
        let record = self.slots[slot].take()?;
        let key = address_key(&record.address);

        if self.by_address.get(&key) == Some(&slot) {
            self.by_address.remove(&key);
            let next = self.slots.iter().position(|r| {
                r.as_ref().is_some_and(|r| address_key(&r.address) == key)
            });
            if let Some(next) = next {
                self.by_address.insert(key, next);
            }
        }

        Some(record)
    }

    /// Records with status `active`, in snapshot order
    pub fn active_records(&self) -> Vec<AddressRecord> {
        self.records().filter(|r| r.status.is_active()).cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &AddressRecord> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Everything a run reads from the store, fetched once
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub prefixes: PrefixTable,
    pub records: AddressIndex,
}

impl RunSnapshot {
    pub fn new(prefixes: Vec<Prefix>, records: Vec<AddressRecord>, policy: PrefixMatchPolicy) -> Self {
        Self {
            prefixes: PrefixTable::new(prefixes, policy),
            records: AddressIndex::new(records),
        }
    }
}
