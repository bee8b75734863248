//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Fetching the per-run snapshot of prefixes and address records
//! - Walking opted-in networks and their client observations
//! - Matching each observation to a prefix and upserting its record
//! - Sweeping active records and expiring the stale ones
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ ObservationSource │─── networks, clients ───┐
//! └───────────────────┘                         │
//!                                               ▼
//!                                      ┌──────────────┐
//!                                      │  Reconciler  │
//!                                      └──────────────┘
//!                                               │
//!              ┌────────────────────────────────┼──────────────────────┐
//!              │                                │                      │
//!              ▼                                ▼                      ▼
//!     ┌──────────────────┐           ┌──────────────────┐    ┌──────────────────┐
//!     │   PrefixTable    │           │   AddressIndex   │    │   AddressStore   │
//!     │   (match)        │           │   (lookup)       │    │   (mutate)       │
//!     └──────────────────┘           └──────────────────┘    └──────────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Build a [`RunSnapshot`] (fatal on failure)
//! 2. List networks (fatal on failure)
//! 3. For each network tagged for discovery, list clients (skip on failure)
//! 4. For each client with an IP inside an active prefix, upsert
//! 5. Optionally sweep the same snapshot for expired records
//!
//! All store calls are awaited one at a time; nothing is spawned.

pub mod sweep;
pub mod upsert;

pub use sweep::{Staleness, SweepSummary, staleness};
pub use upsert::{UpsertOutcome, parse_client_time};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::{ClientObservation, Network};
use crate::snapshot::RunSnapshot;
use crate::traits::{AddressStore, ObservationSource};

/// Outcome counters for one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    pub networks_total: usize,
    pub networks_scanned: usize,
    pub networks_skipped: usize,
    pub networks_failed: usize,
    pub clients_seen: usize,
    pub skipped_no_ip: usize,
    pub skipped_no_prefix: usize,
    pub invalid: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Discovery followed by expiration over one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovery: DiscoverySummary,
    pub expiration: SweepSummary,
}

/// Core reconciliation engine
///
/// Owns the two collaborators and the sync settings. A `Reconciler` holds no
/// per-run state: every run starts from a fresh [`RunSnapshot`].
///
/// ## Concurrency
///
/// Single writer. Two reconcilers running against the same store at once
/// can race on the same address; nothing here prevents it.
pub struct Reconciler {
    source: Box<dyn ObservationSource>,
    store: Box<dyn AddressStore>,
    config: SyncConfig,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// - `Ok(Reconciler)`: Configuration is valid
    /// - `Err(Error::Config)`: Configuration is invalid
    pub fn new(
        source: Box<dyn ObservationSource>,
        store: Box<dyn AddressStore>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            store,
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch prefixes and address records for a new run
    ///
    /// Failure is fatal: the run cannot match or look up anything without it.
    pub async fn snapshot(&self) -> Result<RunSnapshot> {
        let store_name = self.store.store_name();

        let prefixes = self.store.list_prefixes().await.map_err(|e| {
            Error::upstream(format!("Failed to list prefixes from {}: {}", store_name, e))
        })?;
        let records = self.store.list_address_records().await.map_err(|e| {
            Error::upstream(format!("Failed to list address records from {}: {}", store_name, e))
        })?;

        info!(
            "Loaded {} prefixes and {} address records from {}",
            prefixes.len(),
            records.len(),
            store_name
        );

        Ok(RunSnapshot::new(prefixes, records, self.config.prefix_match))
    }

    /// Upsert every eligible client of every opted-in network
    ///
    /// # Returns
    ///
    /// - `Ok(DiscoverySummary)`: The pass completed, possibly with per-item failures
    /// - `Err(Error::Upstream)`: Networks could not be listed
    pub async fn discover(&self, snapshot: &mut RunSnapshot) -> Result<DiscoverySummary> {
        let org_id = &self.config.organization_id;

        let networks = self.source.list_networks(org_id).await.map_err(|e| {
            error!("{} API error listing networks: {}", self.source.source_name(), e);
            Error::upstream(format!("Failed to list networks in organization {}: {}", org_id, e))
        })?;

        let total = networks.len();
        let mut summary = DiscoverySummary {
            networks_total: total,
            ..Default::default()
        };

        debug!("Iterating through {} networks in organization {}", total, org_id);
        for (position, network) in networks.iter().enumerate() {
            if !network.has_tag(&self.config.network_tag) {
                summary.networks_skipped += 1;
                continue;
            }

            debug!(
                "Finding clients in network {} ({} of {})",
                network.name,
                position + 1,
                total
            );
            self.discover_network(snapshot, network, &mut summary).await;
        }

        info!(
            "Discovery: {} of {} networks scanned ({} failed), {} clients, {} created, {} updated, {} failed",
            summary.networks_scanned,
            summary.networks_total,
            summary.networks_failed,
            summary.clients_seen,
            summary.created,
            summary.updated,
            summary.failed
        );

        Ok(summary)
    }

    async fn discover_network(
        &self,
        snapshot: &mut RunSnapshot,
        network: &Network,
        summary: &mut DiscoverySummary,
    ) {
        let clients = match self
            .source
            .list_clients(&network.id, self.config.timespan_secs)
            .await
        {
            Ok(clients) => clients,
            Err(e) => {
                error!(
                    "Failed to list clients in network {} ({}): {}",
                    network.name, network.id, e
                );
                summary.networks_failed += 1;
                return;
            }
        };

        summary.networks_scanned += 1;
        for client in &clients {
            self.process_observation(snapshot, client, summary).await;
        }
    }

    async fn process_observation(
        &self,
        snapshot: &mut RunSnapshot,
        client: &ClientObservation,
        summary: &mut DiscoverySummary,
    ) {
        summary.clients_seen += 1;

        let Some(ip) = client.ip() else {
            summary.skipped_no_ip += 1;
            return;
        };

        let mask_len = match snapshot.prefixes.find_prefix_for(ip) {
            Ok(Some(mask_len)) => mask_len,
            Ok(None) => {
                summary.skipped_no_prefix += 1;
                return;
            }
            Err(e) => {
                warn!("Dropping observation for {}: {}", client.mac, e);
                summary.invalid += 1;
                return;
            }
        };

        match self.upsert(snapshot, client, mask_len).await {
            Ok(UpsertOutcome::Created) => summary.created += 1,
            Ok(UpsertOutcome::Updated) => summary.updated += 1,
            Err(e @ (Error::Parse(_) | Error::InvalidInput(_))) => {
                warn!("Dropping observation for {} ({}): {}", ip, client.mac, e);
                summary.invalid += 1;
            }
            Err(e) => {
                error!("Failed to upsert {}/{}: {}", ip, mask_len, e);
                summary.failed += 1;
            }
        }
    }

    /// Snapshot then discover; the event-triggered entry point
    pub async fn run_discovery(&self) -> Result<DiscoverySummary> {
        let mut snapshot = self.snapshot().await?;
        self.discover(&mut snapshot).await
    }

    /// Snapshot, discover, then expire over the same snapshot
    pub async fn run(&self) -> Result<RunSummary> {
        let mut snapshot = self.snapshot().await?;
        let discovery = self.discover(&mut snapshot).await?;
        let expiration = self.expire(&mut snapshot).await;
        Ok(RunSummary {
            discovery,
            expiration,
        })
    }
}
