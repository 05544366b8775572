use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use invrec_config::secrets::ResolvedSourceSecrets;
use invrec_config::SourceSettings;
use invrec_source::{Source, SourceError};
use serde::Deserialize;

pub const SOURCE_NAME: &str = "clearpass";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OAuth2 client-credentials connection to a ClearPass server.
///
/// The bearer token is the connection state: `open` obtains one, `close`
/// drops it. Every request made through this source carries the client-level
/// timeout.
pub struct ClearpassSource {
    base_url: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl fmt::Debug for ClearpassSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClearpassSource")
            .field("base_url", &self.base_url)
            .field("client_id", &"<REDACTED>")
            .field("client_secret", &"<REDACTED>")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ClearpassSource {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("clearpass http client build failed")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
            token: RwLock::new(None),
        })
    }

    pub fn from_settings(settings: &SourceSettings, secrets: &ResolvedSourceSecrets) -> Result<Self> {
        let url = settings
            .url
            .as_deref()
            .context("CONFIG_INVALID: sources.clearpass.url is required")?;
        let client_id = secrets
            .client_id
            .clone()
            .context("CONFIG_INVALID: sources.clearpass.credentials_env is required")?;
        let client_secret = secrets.client_secret.clone().unwrap_or_default();
        let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        Self::new(url, client_id, client_secret, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Current bearer token, if logged in.
    pub(crate) fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[async_trait::async_trait]
impl Source for ClearpassSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn open(&self) -> Result<(), SourceError> {
        if self.is_connected() {
            return Ok(());
        }

        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });

        let resp = self
            .http
            .post(self.url("/api/oauth"))
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Connect(format!("clearpass oauth request failed: {e}")))?;

        let status = resp.status();
        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(SourceError::Auth(format!(
                "clearpass rejected client credentials status={}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(SourceError::Connect(format!(
                "clearpass oauth http error status={}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Connect(format!("clearpass oauth response decode failed: {e}")))?;

        self.set_token(Some(token.access_token));
        tracing::info!(base_url = %self.base_url, "clearpass login ok");
        Ok(())
    }

    async fn close(&self) {
        if self.is_connected() {
            tracing::debug!(base_url = %self.base_url, "clearpass logout");
        }
        self.set_token(None);
    }

    fn is_connected(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}
