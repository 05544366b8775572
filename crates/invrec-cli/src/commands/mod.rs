pub mod diff;
pub mod endpoint;
pub mod sync;

use anyhow::{Context, Result};
use invrec_config::{InventoryConfig, LoadedConfig};

/// `field=value` filter argument.
pub fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected field=value, got '{raw}'")),
    }
}

/// Load layered config; no paths means built-in defaults.
pub fn load_config(paths: &[String]) -> Result<(Option<LoadedConfig>, InventoryConfig)> {
    if paths.is_empty() {
        return Ok((None, InventoryConfig::default()));
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = invrec_config::load_layered_yaml(&path_refs)?;

    let unused = invrec_config::report_unused_keys(&loaded.config_json);
    for ptr in &unused.unused_leaf_pointers {
        tracing::warn!(key = %ptr, "config key is not used");
    }

    let settings = loaded.settings().context("config settings")?;
    tracing::info!(config_hash = %loaded.config_hash, "config loaded");
    Ok((Some(loaded), settings))
}
