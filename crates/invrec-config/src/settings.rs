//! Typed view of the merged configuration.
//!
//! ```yaml
//! sources:
//!   clearpass:
//!     url: "https://cppm.example.net"
//!     timeout_secs: 5
//!     page_size: 500
//!     credentials_env:
//!       client_id: "CLEARPASS_CLIENT_ID"
//!       client_secret: "CLEARPASS_CLIENT_SECRET"
//!     vars_env:
//!       tacacs_secret: "CLEARPASS_TACACS_SECRET"
//!     maps:
//!       vendors: { ios-xe: "Cisco", eos: "Arista" }
//! fields:
//!   os_name: { "IOS-XE 17": "cisco", "EOS 4": "arista" }
//! sync:
//!   max_in_flight: 10
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lookup tables keyed by canonical field name, e.g. `os_name -> vendor`.
///
/// Immutable once built; normalizers receive it at construction so itemization
/// never reaches for global state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMaps(BTreeMap<String, BTreeMap<String, String>>);

impl FieldMaps {
    pub fn new(tables: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self(tables)
    }

    pub fn table(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(name)
    }

    pub fn lookup(&self, table: &str, raw: &str) -> Option<&str> {
        self.0.get(table)?.get(raw).map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Env var NAMES for client credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEnv {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    /// API base URL (HTTP sources).
    #[serde(default)]
    pub url: Option<String>,
    /// File path (snapshot sources).
    #[serde(default)]
    pub path: Option<String>,
    /// Per-call timeout the source applies to its own requests.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub credentials_env: Option<CredentialEnv>,
    /// Extra secret values the source needs, by logical name -> env var NAME.
    #[serde(default)]
    pub vars_env: BTreeMap<String, String>,
    /// Source-side lookup tables (e.g. canonical os_name -> vendor label).
    #[serde(default)]
    pub maps: FieldMaps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    10
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSettings>,
    #[serde(default)]
    pub fields: FieldMaps,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl InventoryConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: settings do not match schema")
    }

    pub fn source(&self, name: &str) -> Result<&SourceSettings> {
        self.sources
            .get(name)
            .with_context(|| format!("CONFIG_SOURCE_MISSING: no 'sources.{name}' section"))
    }
}
