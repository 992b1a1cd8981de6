use crate::support::{
    SAMPLE_LIMIT, exit_if_rejected, load_batches_or_exit, load_config_or_exit,
    load_sentences_or_exit, load_snapshot_or_exit, print_json_or_exit, print_sample_block,
    sample_with_truncation, yes_no,
};
use seedline_ledger::{RewriteKind, merge_batches, write_merge_outputs};
use serde_json::json;

pub struct Args {
    pub config: Option<String>,
    pub sentences: String,
    pub batches: Vec<String>,
    pub snapshot: Option<String>,
    pub out_dir: String,
    pub json: bool,
}

pub fn run(args: Args) {
    let config = load_config_or_exit(args.config.as_deref());
    let log = load_sentences_or_exit(&args.sentences);
    let batches = load_batches_or_exit(&args.batches);
    let base = args
        .snapshot
        .as_deref()
        .map(|dir| load_snapshot_or_exit(dir, &config));

    let outcome = merge_batches(&log, batches, base, &config).unwrap_or_else(|e| {
        eprintln!("error: merge failed: {e}");
        std::process::exit(1);
    });
    if let Err(e) = std::fs::create_dir_all(&args.out_dir) {
        eprintln!("error: failed to create {}: {e}", args.out_dir);
        std::process::exit(1);
    }
    let summary = write_merge_outputs(&args.out_dir, &outcome).unwrap_or_else(|e| {
        eprintln!("error: failed to write exports: {e}");
        std::process::exit(1);
    });

    let report = &outcome.report;
    let accepted = outcome.violations.is_accepted();
    if args.json {
        print_json_or_exit(&json!({
            "result": outcome.violations.result,
            "complete": report.complete,
            "digest": summary.digest,
            "exports": summary,
            "mergedBatches": report.merged_batches,
            "rejectedBatches": report.rejected.iter().map(|r| &r.batch_id).collect::<Vec<_>>(),
            "deferredBatches": report.deferred.iter().map(|d| &d.batch_id).collect::<Vec<_>>(),
            "unitsCreated": report.units_created,
            "unitsTotal": report.units_total,
            "rewriteCount": report.rewrites.len(),
            "backfillCount": report.backfills.len(),
            "failureClasses": outcome.violations.failure_classes,
        }));
    } else {
        println!("seedline merge -> {}", args.out_dir);
        println!("  Digest: {}", summary.digest);
        println!("  Complete: {}", yes_no(report.complete));
        println!(
            "  Batches: {} merged, {} rejected, {} deferred",
            report.merged_batches.len(),
            report.rejected.len(),
            report.deferred.len()
        );
        println!(
            "  Units: {} created, {} total",
            report.units_created, report.units_total
        );
        println!(
            "  Rewrites: {} cross-batch, {} in-batch, {} promoted, {} remapped",
            report.rewrites_of(RewriteKind::CrossBatchDuplicate).count(),
            report.rewrites_of(RewriteKind::InBatchDuplicate).count(),
            report.rewrites_of(RewriteKind::PromotedToNew).count(),
            report.rewrites_of(RewriteKind::CanonicalIdRemapped).count(),
        );
        println!("  Backfills: {}", report.backfills.len());

        let rejected: Vec<String> = report
            .rejected
            .iter()
            .map(|r| format!("{} ({}): {} defect(s)", r.batch_id, r.range, r.defects.len()))
            .collect();
        let (rejected, truncated) = sample_with_truncation(rejected, SAMPLE_LIMIT);
        print_sample_block("Rejected batches", &rejected, truncated);

        let deferred: Vec<String> = report
            .deferred
            .iter()
            .map(|d| format!("{} ({}) behind {}", d.batch_id, d.range, d.blocked_by))
            .collect();
        let (deferred, truncated) = sample_with_truncation(deferred, SAMPLE_LIMIT);
        print_sample_block("Deferred batches", &deferred, truncated);

        println!("  Result: {}", outcome.violations.result);
    }
    exit_if_rejected(accepted);
}
