//! scenario_apply_concurrency
//!
//! GREEN when:
//! - no more than `max_in_flight` remote calls are outstanding at once;
//! - the callback sees items in completion order, not key order;
//! - every dispatched item resolves before `apply` returns;
//! - a rejected login surfaces as an auth error and blocks fetch.

use std::collections::BTreeMap;
use std::time::Duration;

use invrec_collection::{ApplyRunner, Capabilities, FetchError, MutationOutcome};
use invrec_schemas::{CanonicalItem, IdentityKey};
use invrec_source::{Source, SourceError};
use invrec_testkit::*;

fn batch(hosts: &[&str]) -> BTreeMap<IdentityKey, CanonicalItem> {
    hosts
        .iter()
        .map(|h| (IdentityKey::single(*h), device(h, Some("10.1.0.1"), "hq", "eos")))
        .collect()
}

#[tokio::test]
async fn fan_out_is_bounded() {
    let (store, devs) = memory_devices("nac", Capabilities::ALL, vec![]);
    let hosts = ["a", "b", "c", "d", "e", "f", "g"];
    for h in hosts {
        store.delay_on(IdentityKey::single(h), Duration::from_millis(15));
    }
    let devs = devs.with_runner(ApplyRunner::new(3));

    let report = devs.add_items(batch(&hosts), None).await.unwrap();
    assert_eq!(report.succeeded(), hosts.len());
    assert_eq!(store.peak_in_flight(), 3);
    assert_eq!(store.rows().len(), hosts.len());
}

#[tokio::test]
async fn callback_follows_completion_order() {
    let (store, devs) = memory_devices("nac", Capabilities::ALL, vec![]);
    store.delay_on(IdentityKey::single("a-slow"), Duration::from_millis(120));
    store.delay_on(IdentityKey::single("m-mid"), Duration::from_millis(40));
    store.delay_on(IdentityKey::single("z-fast"), Duration::from_millis(1));

    let mut order = Vec::new();
    let mut cb = |k: &IdentityKey, _: &MutationOutcome| order.push(k.to_string());
    let report = devs
        .add_items(batch(&["a-slow", "m-mid", "z-fast"]), Some(&mut cb))
        .await
        .unwrap();

    assert_eq!(order, vec![r#"("z-fast",)"#, r#"("m-mid",)"#, r#"("a-slow",)"#]);
    assert_eq!(report.outcomes.len(), 3);
}

#[tokio::test]
async fn serial_runner_still_isolates_failures() {
    let (store, devs) = memory_devices("nac", Capabilities::ALL, vec![]);
    store.fail_on(IdentityKey::single("b"));
    let devs = devs.with_runner(ApplyRunner::new(1));

    let report = devs.add_items(batch(&["a", "b", "c"]), None).await.unwrap();
    assert_eq!(store.peak_in_flight(), 1);
    let failures: Vec<(&IdentityKey, &str)> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.contains("rejected"), "{}", failures[0].1);
}

#[tokio::test]
async fn rejected_login_blocks_fetch() {
    let (store, mut devs) = memory_devices("nac", Capabilities::ALL, vec![]);
    devs.source().close().await;
    store.source_handle().reject_logins();

    let err = devs.source().open().await.unwrap_err();
    assert!(matches!(err, SourceError::Auth(_)));
    assert!(matches!(
        devs.fetch(None).await,
        Err(FetchError::NotConnected { .. })
    ));
    assert_eq!(store.source_handle().logins(), 1);
}
