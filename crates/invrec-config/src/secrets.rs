//! Runtime secret resolution for sources.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"CLEARPASS_CLIENT_SECRET"`).
//! - Callers resolve once per source at startup and pass the result into the
//!   source constructor; nothing else reads `std::env` for secrets.
//! - `Debug` output redacts every value.
//! - Error messages name the env var, never its value.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::settings::SourceSettings;

/// Secrets for one source. **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct ResolvedSourceSecrets {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Logical name -> value, for every entry of `vars_env`.
    pub vars: BTreeMap<String, String>,
}

impl ResolvedSourceSecrets {
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl std::fmt::Debug for ResolvedSourceSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vars: BTreeMap<&str, &str> = self
            .vars
            .keys()
            .map(|k| (k.as_str(), "<REDACTED>"))
            .collect();
        f.debug_struct("ResolvedSourceSecrets")
            .field("client_id", &self.client_id.as_ref().map(|_| "<REDACTED>"))
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .field("vars", &vars)
            .finish()
    }
}

/// Resolve a named environment variable; blank counts as unset.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every secret `settings` names for `source`.
///
/// Fails closed: each declared env var must be set and non-blank.
pub fn resolve_source_secrets(source: &str, settings: &SourceSettings) -> Result<ResolvedSourceSecrets> {
    let mut out = ResolvedSourceSecrets::default();

    if let Some(creds) = &settings.credentials_env {
        let Some(id) = resolve_env(&creds.client_id) else {
            bail!(
                "SECRETS_MISSING source={source}: required env var '{}' (client_id) is not set or empty",
                creds.client_id
            );
        };
        let Some(secret) = resolve_env(&creds.client_secret) else {
            bail!(
                "SECRETS_MISSING source={source}: required env var '{}' (client_secret) is not set or empty",
                creds.client_secret
            );
        };
        out.client_id = Some(id);
        out.client_secret = Some(secret);
    }

    for (name, var) in &settings.vars_env {
        let Some(value) = resolve_env(var) else {
            bail!(
                "SECRETS_MISSING source={source}: required env var '{var}' ({name}) is not set or empty"
            );
        };
        out.vars.insert(name.clone(), value);
    }

    Ok(out)
}
