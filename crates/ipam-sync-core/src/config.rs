//! Configuration types for the IPAM sync system

use serde::{Deserialize, Serialize};

/// How the prefix matcher picks among overlapping active prefixes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMatchPolicy {
    /// First active prefix in store order that contains the address
    #[default]
    First,
    /// Most specific active prefix that contains the address
    Longest,
}

impl std::str::FromStr for PrefixMatchPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "longest" => Ok(Self::Longest),
            other => Err(crate::Error::config(format!(
                "Unknown prefix match policy '{}' (expected 'first' or 'longest')",
                other
            ))),
        }
    }
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Controller organization whose networks are scanned
    pub organization_id: String,

    /// Networks must carry this tag to be scanned
    #[serde(default = "default_network_tag")]
    pub network_tag: String,

    /// Tag stamped on records created by the sync
    #[serde(default = "default_discovered_tag")]
    pub discovered_tag: String,

    /// Observation window passed to the source (in seconds)
    #[serde(default = "default_timespan_secs")]
    pub timespan_secs: u64,

    /// Days without an observation before an active record expires
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,

    #[serde(default)]
    pub prefix_match: PrefixMatchPolicy,
}

impl SyncConfig {
    /// Create a configuration with defaults for the given organization
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            network_tag: default_network_tag(),
            discovered_tag: default_discovered_tag(),
            timespan_secs: default_timespan_secs(),
            expiration_days: default_expiration_days(),
            prefix_match: PrefixMatchPolicy::default(),
        }
    }

    pub fn with_expiration_days(mut self, days: i64) -> Self {
        self.expiration_days = days;
        self
    }

    pub fn with_prefix_match(mut self, policy: PrefixMatchPolicy) -> Self {
        self.prefix_match = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.organization_id.trim().is_empty() {
            return Err(crate::Error::config("Organization ID cannot be empty"));
        }
        if self.network_tag.trim().is_empty() {
            return Err(crate::Error::config("Network discovery tag cannot be empty"));
        }
        if self.discovered_tag.trim().is_empty() {
            return Err(crate::Error::config("Discovered tag cannot be empty"));
        }
        if self.timespan_secs == 0 {
            return Err(crate::Error::config("Observation timespan must be > 0"));
        }
        if self.expiration_days < 0 {
            return Err(crate::Error::config("Expiration days cannot be negative"));
        }
        Ok(())
    }
}

fn default_network_tag() -> String {
    "discover-clients".to_string()
}

fn default_discovered_tag() -> String {
    "discovered".to_string()
}

fn default_timespan_secs() -> u64 {
    60 * 60
}

fn default_expiration_days() -> i64 {
    7
}
