//! invrec-clearpass
//!
//! Aruba ClearPass (CPPM) plugin:
//! - [`ClearpassSource`]: OAuth2 client-credentials login against `/api/oauth`
//! - [`ClearpassDeviceStore`]: paged `/api/network-device` listing and device
//!   creation (create is the only supported mutation)
//! - [`ClearpassDeviceNormalizer`]: network device -> canonical device item
//!
//! Secrets (client secret, TACACS shared secret) are passed in by the caller;
//! nothing here reads the environment or logs them.

mod normalizer;
mod source;
mod store;

pub use normalizer::ClearpassDeviceNormalizer;
pub use source::{ClearpassSource, DEFAULT_TIMEOUT_SECS, SOURCE_NAME};
pub use store::{
    device_payload, ClearpassDeviceStore, DeviceFilters, NetworkDevice, DEFAULT_PAGE_SIZE,
};

use std::sync::Arc;

use anyhow::{Context, Result};
use invrec_collection::Collection;
use invrec_config::secrets::resolve_source_secrets;
use invrec_config::InventoryConfig;

/// `vars_env` entry holding the shared TACACS secret written into created devices.
const TACACS_SECRET_VAR: &str = "tacacs_secret";

/// Device collection over ClearPass, as wired from configuration.
pub type ClearpassDevices = Collection<ClearpassDeviceStore, ClearpassDeviceNormalizer>;

/// Build the device collection from the `sources.clearpass` section and the
/// `fields.os_name` table, resolving every secret it names.
pub fn device_collection(cfg: &InventoryConfig) -> Result<ClearpassDevices> {
    let settings = cfg.source(SOURCE_NAME)?;
    let secrets = resolve_source_secrets(SOURCE_NAME, settings)?;

    let tacacs_secret = secrets
        .var(TACACS_SECRET_VAR)
        .context("CONFIG_INVALID: sources.clearpass.vars_env.tacacs_secret is required")?
        .to_string();
    let source = Arc::new(ClearpassSource::from_settings(settings, &secrets)?);
    let vendors = settings.maps.table("vendors").cloned().unwrap_or_default();
    let page_size = settings.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    let store = ClearpassDeviceStore::new(source, vendors, tacacs_secret)
        .with_page_size(page_size);
    let normalizer = ClearpassDeviceNormalizer::new(
        cfg.fields.table("os_name").cloned().unwrap_or_default(),
    );
    let collection = Collection::new(Arc::new(store), normalizer)
        .with_runner(invrec_collection::ApplyRunner::new(cfg.sync.max_in_flight));
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrec_config::settings::CredentialEnv;
    use invrec_config::SourceSettings;

    fn config(vars_env: &[(&str, &str)]) -> InventoryConfig {
        std::env::set_var("INVREC_CP_UNIT_CLIENT_ID", "invrec");
        std::env::set_var("INVREC_CP_UNIT_CLIENT_SECRET", "client-secret");
        std::env::set_var("INVREC_CP_UNIT_TACACS", "tacacs-key");
        let settings = SourceSettings {
            url: Some("https://cppm.example.net".to_string()),
            credentials_env: Some(CredentialEnv {
                client_id: "INVREC_CP_UNIT_CLIENT_ID".to_string(),
                client_secret: "INVREC_CP_UNIT_CLIENT_SECRET".to_string(),
            }),
            vars_env: vars_env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..SourceSettings::default()
        };
        let mut cfg = InventoryConfig::default();
        cfg.sources.insert(SOURCE_NAME.to_string(), settings);
        cfg
    }

    #[test]
    fn missing_tacacs_secret_var_fails() {
        let err = device_collection(&config(&[])).err().unwrap();
        assert!(
            err.to_string()
                .contains("CONFIG_INVALID: sources.clearpass.vars_env.tacacs_secret is required"),
            "{err}"
        );
    }

    #[test]
    fn configured_tacacs_secret_builds_create_only_collection() {
        let devs = device_collection(&config(&[("tacacs_secret", "INVREC_CP_UNIT_TACACS")])).unwrap();
        assert_eq!(devs.name(), "devices");
        assert_eq!(devs.capabilities().supported(), vec![invrec_collection::Operation::Create]);
    }
}
