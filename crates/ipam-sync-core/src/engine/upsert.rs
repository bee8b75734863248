//! Upsert engine: create or refresh the record for one observation

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::Reconciler;
use crate::error::{Error, Result};
use crate::model::{
    ClientObservation, LAST_SEEN_FIELD, MAC_FIELD, NewAddressRecord, RecordUpdate, Status,
};
use crate::snapshot::RunSnapshot;

/// Timestamp format of `ClientObservation::last_seen`
pub const CLIENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Date format of the `last_seen` custom field
pub const LAST_SEEN_DATE_FORMAT: &str = "%Y-%m-%d";

/// What an upsert did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Parse a controller timestamp
pub fn parse_client_time(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), CLIENT_TIME_FORMAT)
        .map_err(|e| Error::parse(format!("Invalid lastSeen '{}': {}", value, e)))
}

/// Custom fields stamped on a record from an observation
pub fn observation_fields(observation: &ClientObservation) -> Result<BTreeMap<String, serde_json::Value>> {
    let last_seen = parse_client_time(&observation.last_seen)?;

    Ok(BTreeMap::from([
        (
            LAST_SEEN_FIELD.to_string(),
            serde_json::Value::String(last_seen.format(LAST_SEEN_DATE_FORMAT).to_string()),
        ),
        (
            MAC_FIELD.to_string(),
            serde_json::Value::String(observation.mac.clone()),
        ),
    ]))
}

impl Reconciler {
    /// Create or update the record for `observation` at `ip/mask_len`
    ///
    /// An existing record is set back to `active` and has its metadata
    /// replaced; identity, tags and description are left alone. A new record
    /// is created `active` and tagged with the discovered tag.
    ///
    /// # Returns
    ///
    /// - `Ok(UpsertOutcome)`: The store accepted the write
    /// - `Err(Error::InvalidInput)`: The observation has no IP
    /// - `Err(Error::Parse)`: `lastSeen` is malformed, nothing was written
    /// - `Err(Error)`: The store rejected the write
    pub async fn upsert(
        &self,
        snapshot: &mut RunSnapshot,
        observation: &ClientObservation,
        mask_len: u8,
    ) -> Result<UpsertOutcome> {
        let ip = observation
            .ip()
            .ok_or_else(|| Error::invalid_input(format!("Observation for {} has no IP", observation.mac)))?;
        let address = format!("{}/{}", ip, mask_len);
        let custom_fields = observation_fields(observation)?;

        if let Some(existing) = snapshot.records.find_record_for(&address) {
            let id = existing.id;
            debug!("Updating {} (id {})", address, id);

            let update = RecordUpdate {
                status: Some(Status::Active),
                custom_fields: Some(custom_fields),
            };
            self.store.update_address_record(id, &update).await?;
            snapshot.records.apply_update(id, &update);

            return Ok(UpsertOutcome::Updated);
        }

        debug!("Adding {}", address);
        let new_record = NewAddressRecord {
            address,
            status: Status::Active,
            description: observation.description.clone().unwrap_or_default(),
            custom_fields,
            tags: BTreeSet::from([self.config.discovered_tag.clone()]),
        };

        let created = self.store.create_address_record(&new_record).await?;
        snapshot.records.insert(created);

        Ok(UpsertOutcome::Created)
    }
}
