//! Expiration sweep: age out active records that stopped being observed

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use super::Reconciler;
use super::upsert::LAST_SEEN_DATE_FORMAT;
use crate::model::{AddressRecord, RecordUpdate, Status};
use crate::snapshot::RunSnapshot;

/// Staleness verdict for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Seen within the threshold
    Fresh,
    /// `last_seen` missing or unparsable; never expired
    Unknown,
    /// Not seen for more than the threshold (whole days elapsed)
    Expired(i64),
}

/// Decide whether `record` has gone stale at `now`
///
/// `last_seen` is read as midnight UTC of that date. The record is expired
/// when the whole days elapsed since then exceed `expiration_days`.
pub fn staleness(record: &AddressRecord, now: DateTime<Utc>, expiration_days: i64) -> Staleness {
    let Some(raw) = record.last_seen() else {
        return Staleness::Unknown;
    };
    let Ok(date) = NaiveDate::parse_from_str(raw.trim(), LAST_SEEN_DATE_FORMAT) else {
        return Staleness::Unknown;
    };
    let Some(seen_at) = date.and_hms_opt(0, 0, 0) else {
        return Staleness::Unknown;
    };

    let elapsed_days = now.signed_duration_since(seen_at.and_utc()).num_days();
    if elapsed_days > expiration_days {
        Staleness::Expired(elapsed_days)
    } else {
        Staleness::Fresh
    }
}

/// Outcome counters for one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub expired: usize,
    pub deleted: usize,
    pub reserved: usize,
    pub unknown: usize,
    pub failed: usize,
}

impl Reconciler {
    /// Sweep the snapshot's active records using the current time
    pub async fn expire(&self, snapshot: &mut RunSnapshot) -> SweepSummary {
        self.expire_at(snapshot, Utc::now()).await
    }

    /// Sweep the snapshot's active records as of `now`
    ///
    /// Expired records carrying the discovered tag are deleted; all other
    /// expired records are demoted to `reserved` with metadata untouched.
    /// Store failures are logged and the sweep moves on.
    pub async fn expire_at(&self, snapshot: &mut RunSnapshot, now: DateTime<Utc>) -> SweepSummary {
        let days = self.config.expiration_days;
        let mut summary = SweepSummary::default();

        for record in snapshot.records.active_records() {
            summary.examined += 1;

            let elapsed = match staleness(&record, now, days) {
                Staleness::Fresh => continue,
                Staleness::Unknown => {
                    summary.unknown += 1;
                    continue;
                }
                Staleness::Expired(elapsed) => elapsed,
            };

            summary.expired += 1;
            debug!(
                "Record for {} has expired: last seen {} day(s) ago",
                record.address, elapsed
            );

            if record.is_discovered(&self.config.discovered_tag) {
                debug!("Deleting {}", record.address);
                match self.store.delete_address_record(record.id).await {
                    Ok(()) => {
                        snapshot.records.remove(record.id);
                        summary.deleted += 1;
                    }
                    Err(e) => {
                        error!("Failed to delete {} (id {}): {}", record.address, record.id, e);
                        summary.failed += 1;
                    }
                }
            } else {
                debug!("Setting {} to 'reserved'", record.address);
                let update = RecordUpdate::status(Status::Reserved);
                match self.store.update_address_record(record.id, &update).await {
                    Ok(()) => {
                        snapshot.records.apply_update(record.id, &update);
                        summary.reserved += 1;
                    }
                    Err(e) => {
                        error!("Failed to reserve {} (id {}): {}", record.address, record.id, e);
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            "Expiration sweep: {} examined, {} deleted, {} reserved, {} unknown, {} failed",
            summary.examined, summary.deleted, summary.reserved, summary.unknown, summary.failed
        );

        summary
    }
}
