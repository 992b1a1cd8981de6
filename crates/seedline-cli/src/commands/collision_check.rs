use crate::support::{
    SAMPLE_LIMIT, load_config_or_exit, load_registry_or_exit, load_sentences_or_exit,
    print_json_or_exit, print_sample_block, sample_with_truncation,
};
use seedline_kernel::{ViolationReport, check_curriculum};

/// Collisions are flags: the command reports them and still exits 0.
pub fn run(config: Option<String>, sentences: String, units: Option<String>, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let log = load_sentences_or_exit(&sentences);
    let registry = units.as_deref().map(|path| load_registry_or_exit(path, &config));

    let violations = check_curriculum(
        log.iter(),
        registry.iter().flat_map(|r| r.units()),
        config.collision.case_sensitive,
    );

    if json_output {
        let report = ViolationReport::from_witnesses(violations.iter().map(|v| v.witness()).collect());
        print_json_or_exit(&report);
    } else {
        println!(
            "seedline collision-check (case-sensitive: {})",
            config.collision.case_sensitive
        );
        println!("  Sentences: {}", log.len());
        if let Some(registry) = &registry {
            println!("  Units: {}", registry.len());
        }
        println!("  Collisions: {}", violations.len());
        let lines: Vec<String> = violations
            .iter()
            .map(|v| {
                format!(
                    "{:?} -> {} [{}]",
                    v.known_text,
                    v.conflicting_target_texts.join(" | "),
                    v.locations.join(", ")
                )
            })
            .collect();
        let (lines, truncated) = sample_with_truncation(lines, SAMPLE_LIMIT);
        print_sample_block("Meanings with several renderings", &lines, truncated);
    }
}
