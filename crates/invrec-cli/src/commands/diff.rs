use anyhow::Result;
use invrec_reconcile::ReconciliationReport;

use super::endpoint::{open_pair, Endpoint};
use super::load_config;
use crate::DiffArgs;

pub async fn run(args: &DiffArgs) -> Result<()> {
    let (report, origin, target) = reconcile(args, None).await?;
    origin.close().await;
    target.close().await;
    print_report(args, &report)
}

/// Build both endpoints, load them, and diff. The endpoints stay open and are
/// returned for callers that go on to apply changes.
pub async fn reconcile(
    args: &DiffArgs,
    concurrency: Option<usize>,
) -> Result<(ReconciliationReport, Endpoint, Endpoint)> {
    let (_, cfg) = load_config(&args.config_paths)?;

    let runner = invrec_collection::ApplyRunner::new(concurrency.unwrap_or(cfg.sync.max_in_flight));
    let mut origin = Endpoint::build(&args.origin, &cfg)?;
    let mut target = Endpoint::build(&args.target, &cfg)?.with_runner(runner);

    open_pair(
        &mut origin,
        &args.origin_filters,
        &mut target,
        &args.target_filters,
        &args.key_fields,
    )
    .await?;

    let report = invrec_reconcile::diff(origin.key_index(), target.key_index(), &args.fields);
    let s = report.summary();
    tracing::info!(
        matched = s.matched,
        changed = s.changed,
        missing_in_target = s.missing_in_target,
        missing_in_origin = s.missing_in_origin,
        "diff complete"
    );
    Ok((report, origin, target))
}

fn print_report(args: &DiffArgs, report: &ReconciliationReport) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(());
    }

    let s = report.summary();
    println!(
        "origin={} target={} keys={} fields={}",
        args.origin,
        args.target,
        args.key_fields.join(","),
        args.fields.join(",")
    );
    println!(
        "matched={} changed={} missing_in_target={} missing_in_origin={}",
        s.matched, s.changed, s.missing_in_target, s.missing_in_origin
    );
    for (key, change) in &report.changed {
        let fields: Vec<&str> = change.fields.iter().map(String::as_str).collect();
        println!("changed {key} {}", fields.join(","));
    }
    for key in report.missing_in_target.keys() {
        println!("missing_in_target {key}");
    }
    for key in report.missing_in_origin.keys() {
        println!("missing_in_origin {key}");
    }
    Ok(())
}
