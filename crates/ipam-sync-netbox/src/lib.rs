// # NetBox Address Store
//
// This crate provides an AddressStore backed by the NetBox REST API.
//
// ## Scope
//
// - ✅ Lists prefixes and IP addresses, following the `next` page URL
// - ✅ Creates, patches and deletes IP address records
// - ✅ Maps HTTP 400 to `Error::Validation` (duplicate or invalid address)
// - ✅ Dry-run mode: reads are real, writes are logged and skipped
// - ❌ NO retry logic (a failed call is reported to the Reconciler)
// - ❌ NO prefix management (prefixes are read-only here)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - List prefixes: GET `/api/ipam/prefixes/`
// - List addresses: GET `/api/ipam/ip-addresses/`
// - Create: POST `/api/ipam/ip-addresses/`
// - Update: PATCH `/api/ipam/ip-addresses/:id/`
// - Delete: DELETE `/api/ipam/ip-addresses/:id/`

use async_trait::async_trait;
use ipam_sync_core::model::{AddressRecord, NewAddressRecord, Prefix, RecordUpdate, Status};
use ipam_sync_core::{AddressStore, Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Objects requested per page
const PAGE_LIMIT: u32 = 1000;

/// NetBox REST client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform all GET requests (prefixes, addresses)
/// - Log the intended POST/PATCH/DELETE
/// - **NOT** modify NetBox
pub struct NetboxClient {
    /// NetBox API token
    /// ⚠️ NEVER log this value
    token: String,

    /// NetBox base URL without trailing slash
    url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,

    /// Ids handed out for records "created" in dry-run mode
    dry_run_ids: AtomicU64,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for NetboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetboxClient")
            .field("token", &"<REDACTED>")
            .field("url", &self.url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl NetboxClient {
    /// Create a new NetBox client
    ///
    /// # Parameters
    ///
    /// - `url`: NetBox base URL (e.g. `https://netbox.example.com`)
    /// - `token`: API token with write access to IPAM addresses
    /// - `dry_run`: If true, perform GET requests but skip writes
    pub fn new(url: impl Into<String>, token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("NetBox API token cannot be empty"));
        }

        let url = url.into().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(Error::config("NetBox URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token,
            url,
            client,
            dry_run,
            dry_run_ids: AtomicU64::new(u64::MAX),
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn addresses_url(&self) -> String {
        format!("{}/api/ipam/ip-addresses/", self.url)
    }

    fn address_url(&self, id: u64) -> String {
        format!("{}/api/ipam/ip-addresses/{}/", self.url, id)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
    }

    /// GET `url` and follow `next` until the last page
    async fn get_all<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let response = self
                .request(reqwest::Method::GET, &url)
                .send()
                .await
                .map_err(|e| Error::http(format!("NetBox request failed: {}", e)))?;
            let response = check_status(response, what).await?;

            let page: Page<T> = response
                .json()
                .await
                .map_err(|e| Error::provider("netbox", format!("Failed to parse {}: {}", what, e)))?;

            items.extend(page.results);
            next = page.next.filter(|n| !n.is_empty());
        }

        tracing::debug!("Fetched {} {} from NetBox", items.len(), what);
        Ok(items)
    }
}

#[async_trait]
impl AddressStore for NetboxClient {
    async fn list_prefixes(&self) -> Result<Vec<Prefix>> {
        let url = format!("{}/api/ipam/prefixes/?limit={}", self.url, PAGE_LIMIT);
        let wire: Vec<WirePrefix> = self.get_all(url, "prefixes").await?;
        Ok(wire.into_iter().filter_map(WirePrefix::into_prefix).collect())
    }

    async fn list_address_records(&self) -> Result<Vec<AddressRecord>> {
        let url = format!("{}?limit={}", self.addresses_url(), PAGE_LIMIT);
        let wire: Vec<WireAddress> = self.get_all(url, "ip addresses").await?;
        Ok(wire.into_iter().map(WireAddress::into_record).collect())
    }

    async fn create_address_record(&self, record: &NewAddressRecord) -> Result<AddressRecord> {
        let payload = create_payload(record);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would POST {} with payload: {}", self.addresses_url(), payload);
            return Ok(AddressRecord {
                id: self.dry_run_ids.fetch_sub(1, Ordering::Relaxed),
                address: record.address.clone(),
                status: record.status.clone(),
                tags: record.tags.clone(),
                custom_fields: record.custom_fields.clone(),
                description: record.description.clone(),
            });
        }

        let response = self
            .request(reqwest::Method::POST, &self.addresses_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("NetBox request failed: {}", e)))?;
        let response = check_status(response, &record.address).await?;

        let created: WireAddress = response
            .json()
            .await
            .map_err(|e| Error::provider("netbox", format!("Failed to parse created address: {}", e)))?;

        tracing::debug!("Created {} (id {})", created.address, created.id);
        Ok(created.into_record())
    }

    async fn update_address_record(&self, id: u64, update: &RecordUpdate) -> Result<()> {
        let url = self.address_url(id);
        let payload = serde_json::to_value(update)?;

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would PATCH {} with payload: {}", url, payload);
            return Ok(());
        }

        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("NetBox request failed: {}", e)))?;
        check_status(response, &format!("ip address {}", id)).await?;
        Ok(())
    }

    async fn delete_address_record(&self, id: u64) -> Result<()> {
        let url = self.address_url(id);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", url);
            return Ok(());
        }

        let response = self
            .request(reqwest::Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| Error::http(format!("NetBox request failed: {}", e)))?;
        check_status(response, &format!("ip address {}", id)).await?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "netbox"
    }
}

/// Pass a successful response through, map anything else to an error
async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    Err(status_error(status, &error_text, what))
}

fn status_error(status: StatusCode, body: &str, what: &str) -> Error {
    match status.as_u16() {
        400 => Error::validation(format!("NetBox rejected {}: {}", what, body)),
        401 | 403 => Error::auth(format!(
            "NetBox rejected the API token or it lacks permission. Status: {}",
            status
        )),
        404 => Error::not_found(format!("NetBox {} not found", what)),
        429 => Error::rate_limited(format!("NetBox rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            "netbox",
            format!("NetBox server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider("netbox", format!("Request for {} failed: {} - {}", what, status, body)),
    }
}

fn create_payload(record: &NewAddressRecord) -> serde_json::Value {
    let tags: Vec<serde_json::Value> = record
        .tags
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();

    serde_json::json!({
        "address": record.address,
        "status": record.status.as_str(),
        "description": record.description,
        "custom_fields": record.custom_fields,
        "tags": tags,
    })
}

/// Paginated list envelope
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

/// NetBox choice field; older releases return the bare value
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireStatus {
    Choice { value: String },
    Plain(String),
}

impl From<WireStatus> for Status {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Choice { value } | WireStatus::Plain(value) => Status::from(value),
        }
    }
}

/// Nested tag object; older releases return the bare name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTag {
    Nested { name: String },
    Plain(String),
}

impl WireTag {
    fn into_name(self) -> String {
        match self {
            WireTag::Nested { name } | WireTag::Plain(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePrefix {
    prefix: String,
    status: WireStatus,
}

impl WirePrefix {
    fn into_prefix(self) -> Option<Prefix> {
        match self.prefix.parse() {
            Ok(cidr) => Some(Prefix::new(cidr, Status::from(self.status))),
            Err(e) => {
                tracing::warn!("Skipping prefix '{}': {}", self.prefix, e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireAddress {
    id: u64,
    address: String,
    status: WireStatus,
    #[serde(default)]
    tags: Vec<WireTag>,
    #[serde(default)]
    custom_fields: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    description: Option<String>,
}

impl WireAddress {
    fn into_record(self) -> AddressRecord {
        AddressRecord {
            id: self.id,
            address: self.address,
            status: Status::from(self.status),
            tags: self.tags.into_iter().map(WireTag::into_name).collect(),
            custom_fields: self.custom_fields.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_address_page_maps_to_records() {
        let page: Page<WireAddress> = serde_json::from_value(serde_json::json!({
            "count": 2,
            "next": "https://netbox.example.com/api/ipam/ip-addresses/?limit=1000&offset=1000",
            "previous": null,
            "results": [
                {
                    "id": 11,
                    "address": "10.0.0.5/24",
                    "status": { "value": "active", "label": "Active" },
                    "tags": [{ "id": 3, "name": "discovered", "slug": "discovered" }],
                    "custom_fields": { "last_seen": "2024-01-01", "mac": "aa:bb:cc:dd:ee:ff" },
                    "description": ""
                },
                {
                    "id": 12,
                    "address": "10.0.0.6/24",
                    "status": "reserved",
                    "tags": [],
                    "custom_fields": null
                }
            ]
        }))
        .unwrap();

        assert!(page.next.is_some());
        let records: Vec<AddressRecord> = page.results.into_iter().map(WireAddress::into_record).collect();

        assert_eq!(records[0].id, 11);
        assert_eq!(records[0].status, Status::Active);
        assert!(records[0].is_discovered("discovered"));
        assert_eq!(records[0].last_seen(), Some("2024-01-01"));

        assert_eq!(records[1].status, Status::Reserved);
        assert!(records[1].custom_fields.is_empty());
        assert_eq!(records[1].description, "");
    }

    #[test]
    fn test_bare_string_status_and_tags_accepted() {
        let wire: WireAddress = serde_json::from_value(serde_json::json!({
            "id": 21,
            "address": "10.0.0.9/24",
            "status": "active",
            "tags": ["discovered", { "id": 4, "name": "printer", "slug": "printer" }]
        }))
        .unwrap();

        let record = wire.into_record();
        assert_eq!(record.status, Status::Active);
        assert!(record.is_discovered("discovered"));
        assert!(record.tags.contains("printer"));
    }

    #[test]
    fn test_unparseable_prefix_is_skipped() {
        let wire: Vec<WirePrefix> = serde_json::from_value(serde_json::json!([
            { "prefix": "10.0.0.0/24", "status": { "value": "active", "label": "Active" } },
            { "prefix": "not-a-prefix", "status": { "value": "active", "label": "Active" } },
            { "prefix": "2001:db8::/48", "status": { "value": "container", "label": "Container" } }
        ]))
        .unwrap();

        let prefixes: Vec<Prefix> = wire.into_iter().filter_map(WirePrefix::into_prefix).collect();
        assert_eq!(prefixes.len(), 2);
        assert_eq!(prefixes[0].cidr.prefix_len(), 24);
        assert_eq!(prefixes[1].status, Status::Other("container".to_string()));
    }

    #[test]
    fn test_create_payload_shape() {
        let record = NewAddressRecord {
            address: "10.0.0.5/24".to_string(),
            status: Status::Active,
            description: String::new(),
            custom_fields: BTreeMap::from([
                ("last_seen".to_string(), serde_json::json!("2024-01-01")),
                ("mac".to_string(), serde_json::json!("aa:bb:cc:dd:ee:ff")),
            ]),
            tags: BTreeSet::from(["discovered".to_string()]),
        };

        assert_eq!(
            create_payload(&record),
            serde_json::json!({
                "address": "10.0.0.5/24",
                "status": "active",
                "description": "",
                "custom_fields": { "last_seen": "2024-01-01", "mac": "aa:bb:cc:dd:ee:ff" },
                "tags": [{ "name": "discovered" }]
            })
        );
    }

    #[test]
    fn test_update_payload_omits_unset_fields() {
        let payload = serde_json::to_value(RecordUpdate::status(Status::Reserved)).unwrap();
        assert_eq!(payload, serde_json::json!({ "status": "reserved" }));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "{\"address\":[\"Duplicate IP address\"]}", "10.0.0.5/24"),
            Error::Validation(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "", "prefixes"),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "ip address 4"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "", "prefixes"),
            Error::Provider { .. }
        ));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            NetboxClient::new("https://netbox.example.com", "", false),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let client = NetboxClient::new("https://netbox.example.com/", "secret_token_12345", false).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("NetboxClient"));
        assert_eq!(client.addresses_url(), "https://netbox.example.com/api/ipam/ip-addresses/");
    }

    #[tokio::test]
    async fn test_dry_run_writes_do_not_touch_network() {
        // Unroutable URL: any real request would fail
        let client = NetboxClient::new("http://127.0.0.1:9", "token", true).unwrap();
        assert!(client.is_dry_run());

        let record = NewAddressRecord {
            address: "10.0.0.5/24".to_string(),
            status: Status::Active,
            description: String::new(),
            custom_fields: BTreeMap::new(),
            tags: BTreeSet::from(["discovered".to_string()]),
        };

        let first = client.create_address_record(&record).await.unwrap();
        let second = client.create_address_record(&record).await.unwrap();
        assert_ne!(first.id, second.id);

        client
            .update_address_record(first.id, &RecordUpdate::status(Status::Reserved))
            .await
            .unwrap();
        client.delete_address_record(first.id).await.unwrap();
    }
}
