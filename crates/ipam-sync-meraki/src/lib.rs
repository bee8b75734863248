// # Meraki Observation Source
//
// This crate provides an ObservationSource backed by the Meraki Dashboard
// API v1.
//
// ## Scope
//
// - ✅ Lists organization networks and network clients
// - ✅ Follows `Link: <...>; rel=next` pagination until exhausted
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error mapping for HTTP status codes (401, 403, 404, 429, 5xx)
// - ❌ NO retry logic (a failed call is reported to the Reconciler)
// - ❌ NO filtering (network tag and IP checks are owned by the Reconciler)
//
// ## Security Requirements
//
// - API key NEVER appears in logs or Debug output
// - Construction fails if the key is empty
//
// ## API Reference
//
// - List networks: GET `/organizations/:organizationId/networks`
// - List clients: GET `/networks/:networkId/clients?timespan=...&perPage=1000`

use async_trait::async_trait;
use ipam_sync_core::model::{ClientObservation, Network};
use ipam_sync_core::{Error, ObservationSource, Result};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LINK};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Meraki Dashboard API base URL
pub const MERAKI_API_BASE: &str = "https://api.meraki.com/api/v1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Clients requested per page (API maximum is 5000)
const CLIENTS_PER_PAGE: u32 = 1000;

/// Meraki Dashboard client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot per call; every list call drains all pages.
pub struct MerakiClient {
    /// Dashboard API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// API base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for MerakiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerakiClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl MerakiClient {
    /// Create a new Meraki client
    ///
    /// # Parameters
    ///
    /// - `api_key`: Dashboard API key with read access to the organization
    /// - `base_url`: API base URL, `None` for [`MERAKI_API_BASE`]
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("Meraki API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| MERAKI_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url` and every `rel=next` page after it
    async fn get_all<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| Error::http(format!("Meraki request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(status_error(status, &error_text, what));
            }

            next = next_link(response.headers());

            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| Error::provider("meraki", format!("Failed to parse {}: {}", what, e)))?;

            pages += 1;
            items.extend(page);
        }

        tracing::debug!("Fetched {} {} in {} page(s)", items.len(), what, pages);
        Ok(items)
    }
}

#[async_trait]
impl ObservationSource for MerakiClient {
    async fn list_networks(&self, organization_id: &str) -> Result<Vec<Network>> {
        let url = format!("{}/organizations/{}/networks", self.base_url, organization_id);
        self.get_all(url, "networks").await
    }

    async fn list_clients(&self, network_id: &str, timespan_secs: u64) -> Result<Vec<ClientObservation>> {
        let url = format!(
            "{}/networks/{}/clients?timespan={}&perPage={}",
            self.base_url, network_id, timespan_secs, CLIENTS_PER_PAGE
        );
        self.get_all(url, "clients").await
    }

    fn source_name(&self) -> &'static str {
        "meraki"
    }
}

/// Map a non-success status to an error
fn status_error(status: StatusCode, body: &str, what: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Meraki rejected the API key or it lacks access. Status: {}",
            status
        )),
        404 => Error::not_found(format!("Meraki {} not found: {}", what, body)),
        429 => Error::rate_limited(format!("Meraki rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            "meraki",
            format!("Meraki server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(
            "meraki",
            format!("Listing {} failed: {} - {}", what, status, body),
        ),
    }
}

/// Extract the `rel=next` target from RFC 5988 Link headers
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let (target, params) = link.trim().split_once(';')?;
            let is_next = params
                .split(';')
                .map(|p| p.trim().replace('"', ""))
                .any(|p| p.eq_ignore_ascii_case("rel=next"));
            if !is_next {
                return None;
            }
            target
                .trim()
                .strip_prefix('<')?
                .strip_suffix('>')
                .map(str::to_string)
        })
}
