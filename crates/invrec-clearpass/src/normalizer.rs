use std::collections::BTreeMap;

use invrec_collection::{normalize_hostname, NormalizationError, Normalizer};
use invrec_schemas::CanonicalItem;
use serde_json::Value;

use crate::store::NetworkDevice;

const ATTR_LOCATION: &str = "Location";
const ATTR_OS_VERSION: &str = "OS Version";

/// ClearPass network device -> canonical device item.
///
/// ClearPass carries no serial number or model, so `sn` and `model` are
/// always empty strings. `vendor` is derived from the `OS Version` attribute
/// through the `os_name` field table.
#[derive(Debug, Clone, Default)]
pub struct ClearpassDeviceNormalizer {
    os_to_vendor: BTreeMap<String, String>,
}

impl ClearpassDeviceNormalizer {
    pub fn new(os_to_vendor: BTreeMap<String, String>) -> Self {
        Self { os_to_vendor }
    }
}

/// Required string value; absent and null are missing, any other JSON type is invalid.
fn text<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a str, NormalizationError> {
    match value {
        None => Err(NormalizationError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(NormalizationError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn attribute<'a>(rec: &'a NetworkDevice, name: &str) -> Result<&'a str, NormalizationError> {
    text(rec.attribute(name), &format!("attributes.{name}"))
}

impl Normalizer for ClearpassDeviceNormalizer {
    type Record = NetworkDevice;

    fn itemize(&self, rec: &NetworkDevice) -> Result<CanonicalItem, NormalizationError> {
        let name = text(rec.field("name"), "name")?;
        let ipaddr = text(rec.field("ip_address"), "ip_address")?;
        let site = attribute(rec, ATTR_LOCATION)?;
        let os_version = attribute(rec, ATTR_OS_VERSION)?;

        let vendor = self
            .os_to_vendor
            .get(os_version)
            .ok_or_else(|| NormalizationError::Unmapped {
                table: "os_name".to_string(),
                value: os_version.to_string(),
            })?;

        Ok(CanonicalItem::new()
            .with("sn", "")
            .with("hostname", normalize_hostname(name))
            .with("ipaddr", ipaddr)
            .with("site", site)
            .with("os_name", os_version)
            .with("vendor", vendor.as_str())
            .with("model", ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> ClearpassDeviceNormalizer {
        ClearpassDeviceNormalizer::new(BTreeMap::from([(
            "ios-xe".to_string(),
            "cisco".to_string(),
        )]))
    }

    fn device(name: &str, os: &str) -> NetworkDevice {
        NetworkDevice(json!({
            "id": 7,
            "name": name,
            "ip_address": "10.0.0.1",
            "vendor_name": "Cisco",
            "attributes": {"Location": "hq", "OS Version": os},
        }))
    }

    #[test]
    fn itemize_builds_full_device_item() {
        let item = normalizer().itemize(&device("SW1.corp.example", "ios-xe")).unwrap();
        assert_eq!(item.str_field("hostname"), Some("sw1"));
        assert_eq!(item.str_field("ipaddr"), Some("10.0.0.1"));
        assert_eq!(item.str_field("site"), Some("hq"));
        assert_eq!(item.str_field("os_name"), Some("ios-xe"));
        assert_eq!(item.str_field("vendor"), Some("cisco"));
        assert_eq!(item.str_field("sn"), Some(""));
        assert_eq!(item.str_field("model"), Some(""));
        assert_eq!(item.len(), 7);
    }

    #[test]
    fn unmapped_os_version_fails() {
        let err = normalizer().itemize(&device("sw1", "eos")).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::Unmapped {
                table: "os_name".to_string(),
                value: "eos".to_string()
            }
        );
    }

    #[test]
    fn missing_location_fails() {
        let mut d = device("sw1", "ios-xe");
        if let Some(attrs) = d.0["attributes"].as_object_mut() {
            attrs.remove("Location");
        }
        let err = normalizer().itemize(&d).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MissingField("attributes.Location".to_string())
        );
    }

    #[test]
    fn null_attributes_count_as_missing() {
        let mut d = device("sw1", "ios-xe");
        d.0["attributes"] = Value::Null;
        let err = normalizer().itemize(&d).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MissingField("attributes.Location".to_string())
        );
    }

    #[test]
    fn non_string_values_are_invalid() {
        let mut d = device("sw1", "ios-xe");
        d.0["attributes"]["OS Version"] = json!(17);
        let err = normalizer().itemize(&d).unwrap_err();
        assert!(
            matches!(err, NormalizationError::InvalidField { ref field, .. } if field == "attributes.OS Version"),
            "{err}"
        );

        let mut d = device("sw1", "ios-xe");
        d.0["name"] = json!(["sw1"]);
        assert!(matches!(
            normalizer().itemize(&d).unwrap_err(),
            NormalizationError::InvalidField { .. }
        ));
    }

    #[test]
    fn non_object_record_is_missing_fields() {
        let err = normalizer().itemize(&NetworkDevice(json!(42))).unwrap_err();
        assert_eq!(err, NormalizationError::MissingField("name".to_string()));
    }
}
