use crate::support::{
    exit_if_rejected, load_config_or_exit, load_registry_or_exit, print_json_or_exit, yes_no,
};
use seedline_kernel::{FrontierIndex, PracticePhrase, Registry, Unit, UnitId, ViolationReport};
use seedline_ledger::jsonl::read_checked_bytes;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UnitRef {
    Id(UnitId),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Basket {
    #[serde(alias = "lego", alias = "unitId", alias = "unit_id")]
    unit: UnitRef,
    #[serde(alias = "practice_phrases", alias = "practicePhrases")]
    phrases: Vec<PracticePhrase>,
}

fn load_basket_or_exit(path: &str) -> Basket {
    let bytes = read_checked_bytes(std::path::Path::new(path)).unwrap_or_else(|e| {
        eprintln!("error: failed to read basket {path}: {e}");
        std::process::exit(1);
    });
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        eprintln!("error: invalid basket {path}: {e}");
        std::process::exit(1);
    })
}

fn resolve_unit_or_exit<'a>(registry: &'a Registry, unit: &UnitRef) -> &'a Unit {
    let found = match unit {
        UnitRef::Id(id) => registry.get(*id),
        UnitRef::Text(text) => registry.lookup_text(text),
    };
    found.unwrap_or_else(|| {
        match unit {
            UnitRef::Id(id) => eprintln!("error: unit {id} is not in the registry"),
            UnitRef::Text(text) => eprintln!("error: no unit with text {text:?}"),
        }
        std::process::exit(1);
    })
}

pub fn run(config: Option<String>, units: String, basket: String, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let registry = load_registry_or_exit(&units, &config);
    let basket = load_basket_or_exit(&basket);
    let unit = resolve_unit_or_exit(&registry, &basket.unit);

    let index = FrontierIndex::build(&registry);
    let report = index.validate_basket(unit, &basket.phrases);
    let violations = ViolationReport::from_witnesses(report.witnesses());

    if json_output {
        print_json_or_exit(&json!({
            "result": violations.result,
            "basket": report,
            "publishable": report.publishable_phrases(),
            "violations": violations.violations,
        }));
    } else {
        println!(
            "seedline gate-check unit {} {:?} at {}",
            report.unit_id, report.unit_text, report.position
        );
        println!("  Practices own unit: {}", yes_no(report.practices_own_unit));
        for (i, result) in report.results.iter().enumerate() {
            if result.ok {
                println!("  [{i}] ok     {}", result.target_text);
            } else {
                println!(
                    "  [{i}] GATE   {} (unavailable: {})",
                    result.target_text,
                    result.violating_token_texts().join(", ")
                );
            }
        }
        let buckets: Vec<String> = report
            .bucket_counts
            .iter()
            .map(|(bucket, count)| {
                let label = if bucket.is_empty() { "-" } else { bucket.as_str() };
                format!("{label}={count}")
            })
            .collect();
        if !buckets.is_empty() {
            println!("  Buckets: {}", buckets.join(" "));
        }
        println!("  Result: {}", violations.result);
    }
    exit_if_rejected(violations.is_accepted());
}
