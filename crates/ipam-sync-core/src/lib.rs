// # ipam-sync-core
//
// Core library for reconciling observed network clients against an IPAM
// inventory.
//
// ## Architecture Overview
//
// - **ObservationSource**: Trait for listing networks and the clients seen on them
// - **AddressStore**: Trait for reading prefixes and mutating address records
// - **RunSnapshot**: Per-run context holding the prefix table and address index
// - **Reconciler**: Drives discovery (upsert) and expiration (demote/delete)
// - **MemoryAddressStore**: In-memory `AddressStore` for tests and embedding
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Reconciliation logic never touches HTTP
// 2. **Sequential**: One store mutation at a time, no spawned tasks
// 3. **Fail Soft**: Per-item failures are logged and counted, never abort a run
// 4. **Library-First**: Binaries are thin wrappers around `Reconciler`

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{PrefixMatchPolicy, SyncConfig};
pub use engine::{DiscoverySummary, Reconciler, RunSummary, SweepSummary, UpsertOutcome};
pub use error::{Error, Result};
pub use model::{AddressRecord, ClientObservation, Network, NewAddressRecord, Prefix, RecordUpdate, Status};
pub use snapshot::{AddressIndex, PrefixTable, RunSnapshot};
pub use store::MemoryAddressStore;
pub use traits::{AddressStore, ObservationSource};
