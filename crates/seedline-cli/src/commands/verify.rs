use crate::support::{
    SAMPLE_LIMIT, exit_if_rejected, load_config_or_exit, load_sentences_or_exit,
    print_json_or_exit, print_sample_block, sample_with_truncation,
};
use seedline_kernel::Severity;
use seedline_ledger::{read_occurrence_rows, read_unit_records, verify_exports};

pub fn run(
    config: Option<String>,
    sentences: String,
    units: String,
    occurrences: String,
    json_output: bool,
) {
    let config = load_config_or_exit(config.as_deref());
    let log = load_sentences_or_exit(&sentences);
    let records = read_unit_records(&units).unwrap_or_else(|e| {
        eprintln!("error: failed to load units {units}: {e}");
        std::process::exit(1);
    });
    let rows = read_occurrence_rows(&occurrences).unwrap_or_else(|e| {
        eprintln!("error: failed to load occurrences {occurrences}: {e}");
        std::process::exit(1);
    });
    let unit_count = records.len();

    let report = verify_exports(&log, records, &rows, &config).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    if json_output {
        print_json_or_exit(&report);
    } else {
        println!("seedline verify");
        println!("  Units: {unit_count}");
        println!("  Sentences exported: {}", rows.len());
        println!(
            "  Violations: {} error, {} warning, {} info",
            report.count(Severity::Error),
            report.count(Severity::Warning),
            report.count(Severity::Info)
        );
        let lines: Vec<String> = report
            .violations
            .iter()
            .map(|w| format!("[{}] {} {}: {}", w.severity, w.class, w.subject, w.message))
            .collect();
        let (lines, truncated) = sample_with_truncation(lines, SAMPLE_LIMIT);
        print_sample_block("Violations", &lines, truncated);
        println!("  Result: {}", report.result);
    }
    exit_if_rejected(report.is_accepted());
}
