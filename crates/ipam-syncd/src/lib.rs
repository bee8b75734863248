// # ipam-syncd - shared runner plumbing
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// - This is a THIN integration layer ONLY
// - DO NOT add reconciliation logic here; it belongs in ipam-sync-core
// - Configuration is via environment variables ONLY
//
// Both binaries (`ipam-sync`, `ipam-sync-handler`) are responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and a current-thread runtime
// 3. Wiring the Meraki source and NetBox store into a Reconciler
// 4. Mapping the outcome to an exit code
//
// ## Configuration
//
// ### Required
// - `NETBOX_URL`: NetBox base URL (http or https)
// - `NETBOX_TOKEN`: NetBox API token
// - `MERAKI_ORG_ID`: Meraki organization id
// - `MERAKI_DASHBOARD_API_KEY`: Meraki Dashboard API key
//
// ### Optional
// - `MERAKI_BASE_URL`: Dashboard API base (default https://api.meraki.com/api/v1)
// - `MERAKI_TIMESPAN`: Client lookback window in seconds (default 3600)
// - `SYNC_EXPIRATION_DAYS`: Days before a record is expired (default 7)
// - `SYNC_NETWORK_TAG`: Network opt-in tag (default discover-clients)
// - `SYNC_DISCOVERED_TAG`: Provenance tag (default discovered)
// - `SYNC_PREFIX_MATCH`: `first` or `longest` (default first)
// - `SYNC_MODE`: `dry-run` to suppress NetBox writes
// - `LOGLEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export NETBOX_URL=https://netbox.example.com
// export NETBOX_TOKEN=0123456789abcdef0123456789abcdef01234567
// export MERAKI_ORG_ID=572081
// export MERAKI_DASHBOARD_API_KEY=...
//
// ipam-sync
// ```

use anyhow::{Context, Result};
use ipam_sync_core::{PrefixMatchPolicy, Reconciler, SyncConfig};
use ipam_sync_meraki::MerakiClient;
use ipam_sync_netbox::NetboxClient;
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Upper bound Meraki accepts for the client lookback window (31 days)
const MAX_TIMESPAN_SECS: u64 = 2_678_400;

/// Exit codes for different termination scenarios
///
/// - 0: Run completed
/// - 1: Configuration or startup error
/// - 2: Runtime error (upstream unavailable)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncExitCode {
    /// Run completed (individual record failures are logged, not fatal)
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Fatal runtime error
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl SyncExitCode {
    /// Exit code for an error that ended the run
    pub fn for_error(error: &ipam_sync_core::Error) -> Self {
        match error {
            ipam_sync_core::Error::Config(_) => SyncExitCode::ConfigError,
            _ => SyncExitCode::RuntimeError,
        }
    }
}

/// Runner configuration
#[derive(Clone)]
pub struct Config {
    pub netbox_url: String,
    netbox_token: String,
    pub meraki_org_id: String,
    meraki_api_key: String,
    pub meraki_base_url: Option<String>,
    pub timespan_secs: u64,
    pub expiration_days: i64,
    pub network_tag: Option<String>,
    pub discovered_tag: Option<String>,
    pub prefix_match: PrefixMatchPolicy,
    pub dry_run: bool,
    pub log_level: String,
}

// Secrets stay out of Debug output
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("netbox_url", &self.netbox_url)
            .field("netbox_token", &"<REDACTED>")
            .field("meraki_org_id", &self.meraki_org_id)
            .field("meraki_api_key", &"<REDACTED>")
            .field("meraki_base_url", &self.meraki_base_url)
            .field("timespan_secs", &self.timespan_secs)
            .field("expiration_days", &self.expiration_days)
            .field("prefix_match", &self.prefix_match)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
        };
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timespan_secs = match optional("MERAKI_TIMESPAN") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("MERAKI_TIMESPAN must be a number of seconds. Got: {}", raw))?,
            None => 3600,
        };

        let expiration_days = match optional("SYNC_EXPIRATION_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .with_context(|| format!("SYNC_EXPIRATION_DAYS must be a whole number of days. Got: {}", raw))?,
            None => 7,
        };

        let prefix_match = match optional("SYNC_PREFIX_MATCH") {
            Some(raw) => raw
                .parse::<PrefixMatchPolicy>()
                .map_err(|e| anyhow::anyhow!("SYNC_PREFIX_MATCH: {}", e))?,
            None => PrefixMatchPolicy::default(),
        };

        let dry_run = match optional("SYNC_MODE").as_deref() {
            None => false,
            Some(mode) if mode.eq_ignore_ascii_case("dry-run") => true,
            Some(mode) if mode.eq_ignore_ascii_case("live") => false,
            Some(mode) => anyhow::bail!("SYNC_MODE '{}' is not valid. Valid modes: dry-run, live", mode),
        };

        Ok(Self {
            netbox_url: required("NETBOX_URL")?,
            netbox_token: required("NETBOX_TOKEN")?,
            meraki_org_id: required("MERAKI_ORG_ID")?,
            meraki_api_key: required("MERAKI_DASHBOARD_API_KEY")?,
            meraki_base_url: optional("MERAKI_BASE_URL"),
            timespan_secs,
            expiration_days,
            network_tag: optional("SYNC_NETWORK_TAG"),
            discovered_tag: optional("SYNC_DISCOVERED_TAG"),
            prefix_match,
            dry_run,
            log_level: optional("LOGLEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Runs before any network I/O.
    pub fn validate(&self) -> Result<()> {
        for (key, url) in [
            ("NETBOX_URL", Some(&self.netbox_url)),
            ("MERAKI_BASE_URL", self.meraki_base_url.as_ref()),
        ] {
            if let Some(url) = url
                && !url.starts_with("https://")
                && !url.starts_with("http://")
            {
                anyhow::bail!("{} must use HTTP or HTTPS scheme. Got: {}", key, url);
            }
        }

        if self.netbox_url.starts_with("http://") {
            eprintln!(
                "WARNING: NETBOX_URL uses HTTP (not HTTPS). \
                The API token will be sent in clear text."
            );
        }

        // Common mistake: copying the example verbatim
        for (key, secret) in [
            ("NETBOX_TOKEN", &self.netbox_token),
            ("MERAKI_DASHBOARD_API_KEY", &self.meraki_api_key),
        ] {
            let lower = secret.to_lowercase();
            if lower.contains("your_token") || lower.contains("replace_me") || lower == "token" {
                anyhow::bail!("{} appears to be a placeholder. Use an actual API key.", key);
            }
        }

        if !(1..=MAX_TIMESPAN_SECS).contains(&self.timespan_secs) {
            anyhow::bail!(
                "MERAKI_TIMESPAN must be between 1 and {} seconds. Got: {}",
                MAX_TIMESPAN_SECS,
                self.timespan_secs
            );
        }

        if self.expiration_days < 0 {
            anyhow::bail!(
                "SYNC_EXPIRATION_DAYS cannot be negative. Got: {}",
                self.expiration_days
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LOGLEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.sync_config()
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))
    }

    /// Core configuration for the Reconciler
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.meraki_org_id.clone())
            .with_expiration_days(self.expiration_days)
            .with_prefix_match(self.prefix_match);
        config.timespan_secs = self.timespan_secs;
        if let Some(tag) = &self.network_tag {
            config.network_tag = tag.clone();
        }
        if let Some(tag) = &self.discovered_tag {
            config.discovered_tag = tag.clone();
        }
        config
    }

    pub fn max_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Install the global tracing subscriber
///
/// Logs go to stderr so stdout stays free for run output.
pub fn init_tracing(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Build the runtime both binaries run on
///
/// The Reconciler awaits one call at a time, so a single thread suffices.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Wire the Meraki source and NetBox store into a Reconciler
pub fn build_reconciler(config: &Config) -> ipam_sync_core::Result<Reconciler> {
    let source = MerakiClient::new(config.meraki_api_key.clone(), config.meraki_base_url.clone())?;
    let store = NetboxClient::new(
        config.netbox_url.clone(),
        config.netbox_token.clone(),
        config.dry_run,
    )?;

    Reconciler::new(Box::new(source), Box::new(store), config.sync_config())
}

/// Parse a trigger event; blank input means no event
pub fn parse_event(raw: &str) -> serde_json::Result<Option<serde_json::Value>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw).map(Some)
}

/// Render a run duration as `H:MM:SS[.ffffff]`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let base = format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60);
    match elapsed.subsec_micros() {
        0 => base,
        micros => format!("{}.{:06}", base, micros),
    }
}
