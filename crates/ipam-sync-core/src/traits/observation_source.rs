// # Observation Source Trait
//
// Defines the interface to the network controller that reports which
// clients were seen, on which network, and when.
//
// ## Implementations
//
// - Meraki Dashboard: `ipam-sync-meraki` crate

use async_trait::async_trait;

use crate::model::{ClientObservation, Network};

/// Trait for network controller implementations
///
/// # Trust Level: Untrusted
///
/// Sources are isolated API clients:
/// - ✅ Perform HTTP/HTTPS calls to their controller only
/// - ✅ Drain pagination before returning
/// - ❌ Retry or back off (a failed call is reported, the reconciler decides)
/// - ❌ Filter networks or clients (owned by `Reconciler`)
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// List every network in an organization
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Network>)`: All networks, all pages
    /// - `Err(Error)`: Authentication, transport or unexpected failure
    async fn list_networks(&self, organization_id: &str) -> Result<Vec<Network>, crate::Error>;

    /// List the clients seen on a network within the last `timespan_secs`
    ///
    /// # Parameters
    ///
    /// - `network_id`: The network to query
    /// - `timespan_secs`: Look-back window in seconds
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ClientObservation>)`: All observations, all pages
    /// - `Err(Error)`: Authentication, transport or unexpected failure
    async fn list_clients(
        &self,
        network_id: &str,
        timespan_secs: u64,
    ) -> Result<Vec<ClientObservation>, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}
