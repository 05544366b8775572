//! scenario_config_hash_stable
//!
//! GREEN when:
//! - the same layered documents always hash to the same value;
//! - key order in the YAML does not change the hash;
//! - an override layer that changes a leaf changes the hash;
//! - files on disk load exactly like the same strings.

use invrec_config::{load_layered_yaml, load_layered_yaml_from_strings};
use std::io::Write;

const BASE: &str = r#"
sources:
  clearpass:
    url: "https://cppm.example.net"
    timeout_secs: 5
fields:
  os_name:
    "IOS-XE 17": "cisco"
sync:
  max_in_flight: 10
"#;

const BASE_REORDERED: &str = r#"
sync:
  max_in_flight: 10
fields:
  os_name:
    "IOS-XE 17": "cisco"
sources:
  clearpass:
    timeout_secs: 5
    url: "https://cppm.example.net"
"#;

const OVERRIDE: &str = r#"
sync:
  max_in_flight: 4
"#;

#[test]
fn hash_is_stable_across_loads_and_key_order() {
    let a = load_layered_yaml_from_strings(&[BASE]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE]).unwrap();
    let c = load_layered_yaml_from_strings(&[BASE_REORDERED]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash, c.config_hash);
    assert_eq!(a.canonical_json, c.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn override_layer_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE, OVERRIDE]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);
    let settings = layered.settings().unwrap();
    assert_eq!(settings.sync.max_in_flight, 4);
    // untouched siblings survive the merge
    assert_eq!(
        settings.source("clearpass").unwrap().timeout_secs,
        Some(5)
    );
}

#[test]
fn files_load_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.yaml");
    let over_path = dir.path().join("override.yaml");
    std::fs::File::create(&base_path)
        .unwrap()
        .write_all(BASE.as_bytes())
        .unwrap();
    std::fs::File::create(&over_path)
        .unwrap()
        .write_all(OVERRIDE.as_bytes())
        .unwrap();

    let from_files = load_layered_yaml(&[
        base_path.to_str().unwrap(),
        over_path.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE, OVERRIDE]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_reported_with_path() {
    let err = load_layered_yaml(&["/nonexistent/invrec/base.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/invrec/base.yaml"));
}
