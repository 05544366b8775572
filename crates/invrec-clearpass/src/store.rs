use std::collections::BTreeMap;
use std::sync::Arc;

use invrec_collection::{Capabilities, FetchError, MutationError, Operation, RecordStore};
use invrec_schemas::{CanonicalItem, IdentityKey};
use invrec_source::Source;
use serde::Deserialize;
use serde_json::Value;

use crate::source::ClearpassSource;

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

const DEVICE_PATH: &str = "/api/network-device";
const COA_PORT: u16 = 3799;

/// ClearPass filter expression, e.g. `{"name": {"$contains": "sw"}}`.
pub type DeviceFilters = Value;

/// Network device record as returned by `/api/network-device`.
///
/// Kept as raw JSON: field shapes are checked at itemization, so one odd
/// device fails on its own instead of failing the page it arrived in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct NetworkDevice(pub Value);

impl NetworkDevice {
    pub fn id(&self) -> Option<u64> {
        self.0.get("id").and_then(Value::as_u64)
    }

    /// Top-level field; JSON `null` reads as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Entry of the `attributes` object; a null or non-object `attributes`
    /// reads as having no entries.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.field("attributes")
            .and_then(|attrs| attrs.get(name))
            .filter(|v| !v.is_null())
    }
}

#[derive(Debug, Deserialize)]
struct DevicePage {
    #[serde(default, rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    items: Vec<NetworkDevice>,
}

/// Network devices on one ClearPass server.
pub struct ClearpassDeviceStore {
    source: Arc<ClearpassSource>,
    vendors: BTreeMap<String, String>,
    tacacs_secret: String,
    page_size: u32,
}

impl ClearpassDeviceStore {
    /// `vendors` maps canonical `os_name` to the ClearPass vendor label used
    /// when creating devices.
    pub fn new(
        source: Arc<ClearpassSource>,
        vendors: BTreeMap<String, String>,
        tacacs_secret: impl Into<String>,
    ) -> Self {
        Self {
            source,
            vendors,
            tacacs_secret: tacacs_secret.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn bearer(&self) -> Option<String> {
        self.source.token()
    }

    async fn fetch_page(
        &self,
        token: &str,
        filter: Option<&str>,
        offset: u64,
    ) -> Result<Vec<NetworkDevice>, FetchError> {
        let limit = self.page_size.to_string();
        let offset = offset.to_string();
        let mut query: Vec<(&str, &str)> = vec![("limit", limit.as_str()), ("offset", offset.as_str())];
        if let Some(f) = filter {
            query.push(("filter", f));
        }

        let resp = self
            .source
            .http()
            .get(self.source.url(DEVICE_PATH))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("clearpass device list request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                code: Some(status.as_u16()),
                message: api_message(&message),
            });
        }

        let page: DevicePage = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(format!("clearpass device page: {e}")))?;
        Ok(page.embedded.map(|e| e.items).unwrap_or_default())
    }
}

/// Device creation body for a canonical device item.
pub fn device_payload(
    item: &CanonicalItem,
    vendors: &BTreeMap<String, String>,
    tacacs_secret: &str,
) -> Result<Value, MutationError> {
    fn field<'a>(item: &'a CanonicalItem, name: &str) -> Result<&'a str, MutationError> {
        item.str_field(name)
            .ok_or_else(|| MutationError::Payload(format!("item has no string field '{name}'")))
    }

    let hostname = field(item, "hostname")?;
    let ipaddr = field(item, "ipaddr")?;
    let site = field(item, "site")?;
    let os_name = field(item, "os_name")?;
    let vendor = vendors.get(os_name).ok_or_else(|| {
        MutationError::Payload(format!("no 'vendors' mapping for os_name '{os_name}'"))
    })?;

    Ok(serde_json::json!({
        "name": hostname,
        "description": "",
        "ip_address": ipaddr,
        "tacacs_secret": tacacs_secret,
        "radius_secret": "",
        "vendor_name": vendor,
        "coa_port": COA_PORT,
        "coa_capable": false,
        "attributes": {
            "Location": site,
            "OS Version": os_name,
        },
    }))
}

/// ClearPass error bodies are JSON with a `detail` field; fall back to the raw text.
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait::async_trait]
impl RecordStore for ClearpassDeviceStore {
    type Record = NetworkDevice;
    type Filters = DeviceFilters;

    fn collection_name(&self) -> &str {
        "devices"
    }

    fn source(&self) -> &dyn Source {
        self.source.as_ref()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with(Operation::Create)
    }

    async fn list(&self, filters: Option<&DeviceFilters>) -> Result<Vec<NetworkDevice>, FetchError> {
        let token = self.bearer().ok_or_else(|| FetchError::NotConnected {
            source: crate::SOURCE_NAME.to_string(),
        })?;
        let filter = filters.map(Value::to_string);

        let mut out = Vec::new();
        let mut offset: u64 = 0;
        loop {
            let page = self.fetch_page(&token, filter.as_deref(), offset).await?;
            let n = page.len();
            out.extend(page);
            tracing::debug!(offset, count = n, "clearpass device page");
            if n < self.page_size as usize {
                break;
            }
            offset += n as u64;
        }
        Ok(out)
    }

    async fn create(&self, key: &IdentityKey, item: &CanonicalItem) -> Result<(), MutationError> {
        let token = self
            .bearer()
            .ok_or_else(|| MutationError::Transport("clearpass source is not connected".to_string()))?;
        let payload = device_payload(item, &self.vendors, &self.tacacs_secret)?;

        let resp = self
            .source
            .http()
            .post(self.source.url(DEVICE_PATH))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MutationError::Transport(format!("clearpass create request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MutationError::Api {
                code: Some(status.as_u16()),
                message: api_message(&body),
            });
        }
        tracing::debug!(key = %key, "clearpass device created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendors() -> BTreeMap<String, String> {
        BTreeMap::from([("ios-xe".to_string(), "Cisco".to_string())])
    }

    fn item() -> CanonicalItem {
        CanonicalItem::new()
            .with("hostname", "sw1")
            .with("ipaddr", "10.0.0.1")
            .with("site", "hq")
            .with("os_name", "ios-xe")
    }

    #[test]
    fn payload_carries_fixed_defaults_and_attributes() {
        let p = device_payload(&item(), &vendors(), "tacacs").unwrap();
        assert_eq!(p["name"], "sw1");
        assert_eq!(p["ip_address"], "10.0.0.1");
        assert_eq!(p["vendor_name"], "Cisco");
        assert_eq!(p["tacacs_secret"], "tacacs");
        assert_eq!(p["radius_secret"], "");
        assert_eq!(p["coa_port"], 3799);
        assert_eq!(p["coa_capable"], false);
        assert_eq!(p["attributes"]["Location"], "hq");
        assert_eq!(p["attributes"]["OS Version"], "ios-xe");
    }

    #[test]
    fn payload_without_vendor_mapping_fails() {
        let mut it = item();
        it.insert("os_name", "junos");
        let err = device_payload(&it, &vendors(), "t").unwrap_err();
        assert!(matches!(err, MutationError::Payload(ref m) if m.contains("junos")));
    }

    #[test]
    fn payload_without_ip_fails() {
        let it = CanonicalItem::new()
            .with("hostname", "sw1")
            .with("site", "hq")
            .with("os_name", "ios-xe");
        assert!(device_payload(&it, &vendors(), "t").is_err());
    }

    #[test]
    fn api_message_prefers_detail() {
        assert_eq!(api_message(r#"{"detail":"name exists"}"#), "name exists");
        assert_eq!(api_message(" boom \n"), "boom");
    }
}
