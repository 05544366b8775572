use anyhow::{bail, Result};
use invrec_collection::{ApplyReport, MutationOutcome, Operation, UnsupportedOperation};
use invrec_schemas::IdentityKey;

use super::diff::reconcile;
use crate::SyncArgs;

pub async fn run(args: &SyncArgs) -> Result<()> {
    if !(args.create_missing || args.update_changed || args.delete_extra) {
        bail!("nothing to do: pass --create-missing, --update-changed and/or --delete-extra");
    }

    let (report, origin, target) = reconcile(&args.diff, args.concurrency).await?;
    let s = report.summary();
    println!(
        "matched={} changed={} missing_in_target={} missing_in_origin={}",
        s.matched, s.changed, s.missing_in_target, s.missing_in_origin
    );

    let mut failed = 0usize;
    let mut refused: Vec<UnsupportedOperation> = Vec::new();

    if args.create_missing {
        let mut cb = printer(Operation::Create);
        let res = target
            .add_items(report.missing_in_target.clone(), Some(&mut cb))
            .await;
        tally(res, &mut failed, &mut refused);
    }
    if args.update_changed {
        let mut cb = printer(Operation::Update);
        let res = target
            .update_items(report.changed.clone(), Some(&mut cb))
            .await;
        tally(res, &mut failed, &mut refused);
    }
    if args.delete_extra {
        let mut cb = printer(Operation::Delete);
        let res = target
            .delete_items(report.missing_in_origin.clone(), Some(&mut cb))
            .await;
        tally(res, &mut failed, &mut refused);
    }

    origin.close().await;
    target.close().await;

    for r in &refused {
        eprintln!("{r}");
    }
    if !refused.is_empty() || failed > 0 {
        bail!(
            "sync incomplete: failed_items={} unsupported_operations={}",
            failed,
            refused.len()
        );
    }
    Ok(())
}

/// Prints each outcome the moment its item resolves.
fn printer(op: Operation) -> impl FnMut(&IdentityKey, &MutationOutcome) + Send {
    move |key, outcome| println!("{op} {key} {outcome}")
}

fn tally(
    res: Result<ApplyReport, UnsupportedOperation>,
    failed: &mut usize,
    refused: &mut Vec<UnsupportedOperation>,
) {
    match res {
        Ok(report) => *failed += report.failed(),
        Err(e) => refused.push(e),
    }
}
