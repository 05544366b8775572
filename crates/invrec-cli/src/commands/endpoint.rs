//! Runtime-selected system of record.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use invrec_clearpass::ClearpassDevices;
use invrec_collection::{
    ApplyReport, ApplyRunner, KeyStats, OutcomeCallback, UnsupportedOperation,
};
use invrec_config::InventoryConfig;
use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange, KeyIndex};
use invrec_snapshot::SnapshotCollection;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointSpec {
    Clearpass,
    File(PathBuf),
}

impl FromStr for EndpointSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clearpass" => Ok(EndpointSpec::Clearpass),
            _ => match s.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(EndpointSpec::File(PathBuf::from(path))),
                _ => Err(format!("unknown endpoint '{s}' (expected clearpass or file:<path>)")),
            },
        }
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointSpec::Clearpass => f.write_str("clearpass"),
            EndpointSpec::File(p) => write!(f, "file:{}", p.display()),
        }
    }
}

/// A device collection over whichever backend the command line named.
pub enum Endpoint {
    Clearpass(ClearpassDevices),
    File(SnapshotCollection),
}

macro_rules! each {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Endpoint::Clearpass($c) => $body,
            Endpoint::File($c) => $body,
        }
    };
}

impl Endpoint {
    pub fn build(spec: &EndpointSpec, cfg: &InventoryConfig) -> Result<Self> {
        match spec {
            EndpointSpec::Clearpass => Ok(Endpoint::Clearpass(
                invrec_clearpass::device_collection(cfg).context("clearpass endpoint")?,
            )),
            EndpointSpec::File(path) => Ok(Endpoint::File(invrec_snapshot::snapshot_collection(
                path.clone(),
                "devices",
                cfg.fields.clone(),
            ))),
        }
    }

    pub fn with_runner(self, runner: ApplyRunner) -> Self {
        match self {
            Endpoint::Clearpass(c) => Endpoint::Clearpass(c.with_runner(runner)),
            Endpoint::File(c) => Endpoint::File(c.with_runner(runner)),
        }
    }

    pub fn label(&self) -> String {
        each!(self, c => format!("{}/{}", c.source().name(), c.name()))
    }

    pub async fn open(&self) -> Result<()> {
        let label = self.label();
        each!(self, c => c.source().open().await.with_context(|| format!("open {label}")))
    }

    pub async fn close(&self) {
        each!(self, c => c.source().close().await)
    }

    /// Fetch everything matching `filters` and build the key index.
    pub async fn load(&mut self, filters: &[(String, String)], key_fields: &[String]) -> Result<()> {
        let label = self.label();
        let keys: Vec<&str> = key_fields.iter().map(String::as_str).collect();
        match self {
            Endpoint::Clearpass(c) => {
                let f = clearpass_filter(filters);
                c.fetch(f.as_ref())
                    .await
                    .with_context(|| format!("fetch {label}"))?;
                c.make_keys(&keys);
            }
            Endpoint::File(c) => {
                let f: Option<BTreeMap<String, String>> =
                    (!filters.is_empty()).then(|| filters.iter().cloned().collect());
                c.fetch(f.as_ref())
                    .await
                    .with_context(|| format!("fetch {label}"))?;
                c.make_keys(&keys);
            }
        }
        let stats = self.key_stats();
        tracing::info!(
            endpoint = %label,
            records = stats.records,
            indexed = stats.indexed,
            dropped = stats.dropped,
            collisions = stats.collisions,
            "keys built"
        );
        Ok(())
    }

    pub fn key_index(&self) -> &KeyIndex {
        each!(self, c => c.key_index())
    }

    pub fn key_stats(&self) -> KeyStats {
        each!(self, c => c.key_stats())
    }

    pub async fn add_items(
        &self,
        items: BTreeMap<IdentityKey, CanonicalItem>,
        callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation> {
        each!(self, c => c.add_items(items, callback).await)
    }

    pub async fn update_items(
        &self,
        items: BTreeMap<IdentityKey, ItemChange>,
        callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation> {
        each!(self, c => c.update_items(items, callback).await)
    }

    pub async fn delete_items(
        &self,
        items: BTreeMap<IdentityKey, CanonicalItem>,
        callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation> {
        each!(self, c => c.delete_items(items, callback).await)
    }
}

/// `field=value` pairs as a ClearPass equality filter object.
fn clearpass_filter(filters: &[(String, String)]) -> Option<serde_json::Value> {
    if filters.is_empty() {
        return None;
    }
    let obj: serde_json::Map<String, serde_json::Value> = filters
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    Some(serde_json::Value::Object(obj))
}

/// Open both sides, fetch each with its own filters, and build key indexes.
/// Opened sources are closed again when loading fails.
pub async fn open_pair(
    origin: &mut Endpoint,
    origin_filters: &[(String, String)],
    target: &mut Endpoint,
    target_filters: &[(String, String)],
    key_fields: &[String],
) -> Result<()> {
    let dedup: BTreeSet<&String> = key_fields.iter().collect();
    if dedup.len() != key_fields.len() {
        anyhow::bail!("duplicate --key field");
    }

    origin.open().await?;
    if let Err(e) = target.open().await {
        origin.close().await;
        return Err(e);
    }

    let loaded = async {
        origin.load(origin_filters, key_fields).await?;
        target.load(target_filters, key_fields).await
    }
    .await;
    if loaded.is_err() {
        origin.close().await;
        target.close().await;
    }
    loaded
}
