//! Integration tests: whole merges over a generated hundred-sentence
//! curriculum, including export, reimport, and re-merge.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use seedline_kernel::{CurriculumConfig, OccurrenceStatus, RegistryConfig, Sentence, SentenceId};
use seedline_ledger::{
    BatchProposal, ProposedOccurrence, RewriteKind, SentenceLog, SentenceProposal, SentenceRange,
    adapt_batch_str, load_snapshot, merge_batches, read_occurrence_rows, read_unit_records,
    render_exports, verify_exports, write_merge_outputs,
};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "seedline-ledger-{prefix}-{}-{unique}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn config() -> CurriculumConfig {
    CurriculumConfig::new(false)
}

/// S0049 and S0051 are "Gracias."; every other sentence is "Quiero palabraN."
fn sentence_text(i: u32) -> (String, String) {
    if i == 49 || i == 51 {
        ("Thank you.".into(), "Gracias.".into())
    } else {
        (format!("I want word {i}."), format!("Quiero palabra{i}."))
    }
}

fn log() -> SentenceLog {
    SentenceLog::new(
        (1..=100)
            .map(|i| {
                let (known, target) = sentence_text(i);
                Sentence::new(SentenceId(i), known, target)
            })
            .collect(),
    )
    .expect("ordered")
}

fn decomposition(i: u32) -> SentenceProposal {
    let occurrences = if i == 49 || i == 51 {
        vec![ProposedOccurrence::atomic("Gracias", "Thank you")]
    } else {
        vec![
            ProposedOccurrence::atomic("Quiero", "I want"),
            ProposedOccurrence::atomic(format!("palabra{i}"), format!("word {i}")),
        ]
    };
    SentenceProposal::new(SentenceId(i), occurrences)
}

fn batch(id: &str, start: u32, end: u32) -> BatchProposal {
    BatchProposal {
        batch_id: id.into(),
        range: SentenceRange::new(SentenceId(start), SentenceId(end)),
        sentences: (start..=end).map(decomposition).collect(),
    }
}

#[test]
fn earliest_sentence_owns_text_proposed_by_two_batches() {
    let outcome = merge_batches(
        &log(),
        vec![batch("w2", 51, 100), batch("w1", 1, 50)],
        None,
        &config(),
    )
    .expect("merge");

    let gracias = outcome.registry.lookup_text("gracias").expect("registered");
    assert_eq!(gracias.introduced_at, SentenceId(49));

    let s51 = &outcome.timeline[50];
    assert_eq!(s51.sentence_id, SentenceId(51));
    assert_eq!(s51.occurrences[0].canonical_id, gracias.id);
    assert_eq!(s51.occurrences[0].status, OccurrenceStatus::Reference);

    let cross: Vec<_> = outcome
        .report
        .rewrites_of(RewriteKind::CrossBatchDuplicate)
        .map(|r| (r.sentence_id, r.target_text.as_str()))
        .collect();
    assert!(cross.contains(&(SentenceId(51), "Gracias")));
    assert!(outcome.report.complete);
    assert_eq!(outcome.registry.len(), 1 + 98 + 1);
}

#[test]
fn any_arrival_order_gives_the_same_registry() {
    let batches = || {
        vec![
            batch("a", 1, 20),
            batch("b", 21, 45),
            batch("c", 46, 70),
            batch("d", 71, 100),
        ]
    };
    let reference = merge_batches(&log(), batches(), None, &config()).unwrap();
    let reference_export = render_exports(&reference.registry, &reference.timeline).unwrap();

    for rotation in 1..4 {
        let mut shuffled = batches();
        shuffled.rotate_left(rotation);
        shuffled.swap(0, 2);
        let outcome = merge_batches(&log(), shuffled, None, &config()).unwrap();
        let export = render_exports(&outcome.registry, &outcome.timeline).unwrap();
        assert_eq!(export, reference_export, "rotation {rotation}");
    }

    let single = merge_batches(&log(), vec![batch("all", 1, 100)], None, &config()).unwrap();
    let single_export = render_exports(&single.registry, &single.timeline).unwrap();
    assert_eq!(single_export, reference_export);
}

#[test]
fn export_reimport_and_replay_is_byte_identical() {
    let dir = TempDirGuard::new("idempotent");
    let first = merge_batches(
        &log(),
        vec![batch("w1", 1, 50), batch("w2", 51, 100)],
        None,
        &config(),
    )
    .unwrap();
    let written = write_merge_outputs(&dir.path, &first).unwrap();
    let units_before = std::fs::read(&written.units_path).unwrap();
    let occurrences_before = std::fs::read(&written.occurrences_path).unwrap();

    let snapshot = load_snapshot(&dir.path, RegistryConfig::from(&config())).unwrap();
    let second = merge_batches(
        &log(),
        vec![batch("w1", 1, 50), batch("w2", 51, 100)],
        Some(snapshot),
        &config(),
    )
    .unwrap();
    let rendered = render_exports(&second.registry, &second.timeline).unwrap();
    assert_eq!(rendered.units, units_before);
    assert_eq!(rendered.occurrences, occurrences_before);
    assert_eq!(rendered.digest, written.digest);
    assert_eq!(second.report.units_created, 0);

    let report = verify_exports(
        &log(),
        read_unit_records(&written.units_path).unwrap(),
        &read_occurrence_rows(&written.occurrences_path).unwrap(),
        &config(),
    )
    .unwrap();
    assert!(report.is_accepted(), "{:?}", report.violations);
}

#[test]
fn merging_onto_a_previous_run_keeps_its_occurrences() {
    let first_dir = TempDirGuard::new("first-run");
    let second_dir = TempDirGuard::new("second-run");

    let first = merge_batches(&log(), vec![batch("w1", 1, 50)], None, &config()).unwrap();
    write_merge_outputs(&first_dir.path, &first).unwrap();

    let snapshot = load_snapshot(&first_dir.path, RegistryConfig::from(&config())).unwrap();
    assert_eq!(snapshot.timeline().len(), 50);
    let second = merge_batches(
        &log(),
        vec![batch("w2", 51, 100)],
        Some(snapshot),
        &config(),
    )
    .unwrap();
    assert_eq!(second.timeline.len(), 100);
    assert_eq!(second.timeline[0].sentence_id, SentenceId(1));
    let written = write_merge_outputs(&second_dir.path, &second).unwrap();

    let one_shot = merge_batches(
        &log(),
        vec![batch("w1", 1, 50), batch("w2", 51, 100)],
        None,
        &config(),
    )
    .unwrap();
    let expected = render_exports(&one_shot.registry, &one_shot.timeline).unwrap();
    assert_eq!(written.digest, expected.digest);

    let report = verify_exports(
        &log(),
        read_unit_records(&written.units_path).unwrap(),
        &read_occurrence_rows(&written.occurrences_path).unwrap(),
        &config(),
    )
    .unwrap();
    assert!(report.is_accepted(), "{:?}", report.violations);
}

#[test]
fn stale_worker_claims_are_corrected_from_adapted_input() {
    let sentences = SentenceLog::new(vec![
        Sentence::new(SentenceId(1), "I want to speak.", "Quiero hablar."),
        Sentence::new(SentenceId(2), "I want to eat.", "Quiero comer."),
    ])
    .unwrap();
    let first = adapt_batch_str(
        r#"{"batch_id": "w1", "seeds": [
            {"seed_id": "S0001", "legos": [
                {"target": "Quiero", "known": "I want", "type": "A", "new": true, "id": 1},
                {"target": "hablar", "known": "to speak", "type": "A", "new": true, "id": 2}
            ]}
        ]}"#,
        "w1.json",
    )
    .unwrap();
    // Worker two started from an empty snapshot, so it believes it owns
    // "Quiero" and numbered its units from 1.
    let second = adapt_batch_str(
        r#"[{"sentenceId": 2, "occurrences": [
            {"targetText": "Quiero", "knownText": "I want", "claimedStatus": "new", "claimedCanonicalId": 1},
            {"targetText": "comer", "knownText": "to eat", "claimedStatus": "new", "claimedCanonicalId": 2}
        ]}]"#,
        "w2",
    )
    .unwrap();

    let outcome = merge_batches(&sentences, vec![second, first], None, &config()).unwrap();
    let kinds: Vec<(u32, RewriteKind)> = outcome
        .report
        .rewrites
        .iter()
        .map(|r| (r.sentence_id.value(), r.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (2, RewriteKind::CrossBatchDuplicate),
            (2, RewriteKind::CanonicalIdRemapped),
        ]
    );
    assert_eq!(outcome.registry.lookup_text("comer").unwrap().id.value(), 3);
    insta::assert_json_snapshot!(&outcome.report.merged_batches, @r###"
    [
      "w1",
      "w2"
    ]
    "###);
}
