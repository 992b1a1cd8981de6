use crate::support::{
    SAMPLE_LIMIT, exit_if_rejected, load_batches_or_exit, load_config_or_exit,
    load_sentences_or_exit, print_json_or_exit, print_sample_block, sample_with_truncation,
};
use seedline_ledger::validate_batches;
use serde_json::json;

pub fn run(config: Option<String>, sentences: String, batches: Vec<String>, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let log = load_sentences_or_exit(&sentences);
    let batches = load_batches_or_exit(&batches);

    let checks = validate_batches(&batches, &log, config.tiling.mode);
    let accepted = checks.iter().all(|c| c.is_valid());

    if json_output {
        print_json_or_exit(&json!({
            "result": if accepted { "accepted" } else { "rejected" },
            "batches": checks,
        }));
    } else {
        println!("seedline tiling-check ({} batch(es))", checks.len());
        for check in &checks {
            let verdict = if check.is_valid() { "ok" } else { "INVALID" };
            println!(
                "  {} ({}): {verdict}, {} sentence(s)",
                check.batch_id, check.range, check.sentences_checked
            );
            let defects: Vec<String> = check.defects.iter().map(ToString::to_string).collect();
            let (defects, truncated) = sample_with_truncation(defects, SAMPLE_LIMIT);
            print_sample_block("Defects", &defects, truncated);
        }
    }
    exit_if_rejected(accepted);
}
