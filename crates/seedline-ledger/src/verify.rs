//! Re-check exported artifacts without replaying any batch.
//!
//! A unit export that cannot be loaded (duplicate or sparse ids, duplicate
//! texts) is a hard error. Everything else is reported as witnesses:
//! occurrence rows must be strictly increasing by sentence, must tile their
//! sentence, and must reference known units. No sentence may use a unit
//! before the sentence that owns it.

use serde_json::json;
use std::collections::BTreeMap;

use seedline_kernel::collision::sentence_pairs;
use seedline_kernel::witness::failure_class;
use seedline_kernel::{
    CurriculumConfig, Registry, RegistryConfig, SentenceId, Severity, UnitId, UnitRecord,
    ViolationReport, Witness, check_collisions, validate_tiling,
};

use crate::LedgerError;
use crate::export::OccurrenceRow;
use crate::sentences::SentenceLog;

pub fn verify_exports(
    log: &SentenceLog,
    records: Vec<UnitRecord>,
    rows: &[OccurrenceRow],
    config: &CurriculumConfig,
) -> Result<ViolationReport, LedgerError> {
    let registry = Registry::from_snapshot(records, RegistryConfig::from(config))?;
    let mut witnesses = Vec::new();
    let mut first_use: BTreeMap<UnitId, SentenceId> = BTreeMap::new();

    let mut previous: Option<SentenceId> = None;
    for row in rows {
        let subject = format!("sentence:{}", row.sentence_id);
        if let Some(previous) = previous
            && row.sentence_id <= previous
        {
            witnesses.push(Witness::new(
                failure_class::OCCURRENCE_ORDER,
                subject.clone(),
                format!(
                    "{} follows {previous}; occurrence rows must be strictly increasing",
                    row.sentence_id
                ),
                Some(json!({ "previous": previous })),
                Severity::Error,
            ));
        }
        previous = Some(row.sentence_id);
        let Some(sentence) = log.get(row.sentence_id) else {
            witnesses.push(Witness::new(
                failure_class::UNKNOWN_REFERENCE,
                subject,
                format!("{} is not in the sentence log", row.sentence_id),
                None,
                Severity::Error,
            ));
            continue;
        };

        let mut texts = Vec::with_capacity(row.canonical_ids.len());
        for (position, unit_id) in row.canonical_ids.iter().enumerate() {
            match registry.get(*unit_id) {
                Some(unit) => {
                    texts.push(unit.target_text.as_str());
                    first_use
                        .entry(*unit_id)
                        .and_modify(|at| *at = (*at).min(row.sentence_id))
                        .or_insert(row.sentence_id);
                }
                None => witnesses.push(Witness::new(
                    failure_class::UNKNOWN_REFERENCE,
                    format!("{subject}/position:{position}"),
                    format!("unit {unit_id} is not in the unit export"),
                    Some(json!({ "canonicalId": unit_id })),
                    Severity::Error,
                )),
            }
        }
        if texts.len() == row.canonical_ids.len()
            && let Some(witness) = validate_tiling(sentence, texts, config.tiling.mode).witness(subject)
        {
            witnesses.push(witness);
        }
    }

    let exported: BTreeMap<SentenceId, &OccurrenceRow> =
        rows.iter().map(|row| (row.sentence_id, row)).collect();
    for unit in registry.units() {
        let subject = format!("unit:{}", unit.id);
        if let Some(&first) = first_use.get(&unit.id)
            && first < unit.introduced_at
        {
            witnesses.push(Witness::new(
                failure_class::OWNERSHIP_MISMATCH,
                subject.clone(),
                format!(
                    "{:?} is used at {first} before its owner {}",
                    unit.target_text, unit.introduced_at
                ),
                Some(json!({ "firstUse": first, "owner": unit.introduced_at })),
                Severity::Error,
            ));
        }
        if let Some(row) = exported.get(&unit.introduced_at)
            && !row.canonical_ids.contains(&unit.id)
        {
            witnesses.push(Witness::new(
                failure_class::OWNERSHIP_MISMATCH,
                subject,
                format!(
                    "{:?} claims {} as owner but that sentence does not use it",
                    unit.target_text, unit.introduced_at
                ),
                Some(json!({ "owner": unit.introduced_at })),
                Severity::Error,
            ));
        }
    }

    witnesses.extend(registry.collision_flags().iter().map(|f| f.witness()));
    witnesses.extend(
        check_collisions(&sentence_pairs(log.iter()), config.collision.case_sensitive)
            .iter()
            .map(|v| v.witness()),
    );

    let report = ViolationReport::from_witnesses(witnesses);
    tracing::info!(
        units = registry.len(),
        sentences = rows.len(),
        result = %report.result,
        "exports verified"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedline_kernel::{Sentence, UnitKindTag};

    fn log() -> SentenceLog {
        SentenceLog::new(vec![
            Sentence::new(SentenceId(1), "I want to speak.", "Quiero hablar."),
            Sentence::new(SentenceId(2), "I want to eat.", "Quiero comer."),
        ])
        .unwrap()
    }

    fn record(id: u32, target: &str, known: &str, at: u32) -> UnitRecord {
        UnitRecord {
            canonical_id: UnitId(id),
            kind: UnitKindTag::Atomic,
            target_text: target.into(),
            known_text: known.into(),
            introducing_sentence_id: SentenceId(at),
            components: None,
        }
    }

    fn records() -> Vec<UnitRecord> {
        vec![
            record(1, "Quiero", "I want", 1),
            record(2, "hablar", "to speak", 1),
            record(3, "comer", "to eat", 2),
        ]
    }

    fn row(at: u32, ids: &[u32]) -> OccurrenceRow {
        OccurrenceRow {
            sentence_id: SentenceId(at),
            canonical_ids: ids.iter().map(|i| UnitId(*i)).collect(),
        }
    }

    #[test]
    fn consistent_exports_verify() {
        let report = verify_exports(
            &log(),
            records(),
            &[row(1, &[1, 2]), row(2, &[1, 3])],
            &CurriculumConfig::new(false),
        )
        .unwrap();
        assert!(report.is_accepted(), "{:?}", report.violations);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn broken_exports_are_witnessed() {
        let mut units = records();
        units[2].introducing_sentence_id = SentenceId(2);
        units[0].introducing_sentence_id = SentenceId(2);
        let report = verify_exports(
            &log(),
            units,
            &[row(1, &[1, 2]), row(2, &[1, 9])],
            &CurriculumConfig::new(false),
        )
        .unwrap();
        assert!(!report.is_accepted());
        assert_eq!(
            report.failure_classes,
            vec!["ownership_mismatch", "unknown_reference"]
        );
    }

    #[test]
    fn row_order_does_not_hide_an_early_use() {
        let mut units = records();
        units[0].introducing_sentence_id = SentenceId(2);
        let config = CurriculumConfig::new(false);

        let rows = [row(1, &[1, 2]), row(2, &[1, 3])];
        let sorted = verify_exports(&log(), units.clone(), &rows, &config).unwrap();
        assert_eq!(sorted.failure_classes, vec!["ownership_mismatch"]);

        let reversed =
            verify_exports(&log(), units, &[row(2, &[1, 3]), row(1, &[1, 2])], &config).unwrap();
        assert!(!reversed.is_accepted());
        assert_eq!(
            reversed.failure_classes,
            vec!["occurrence_order", "ownership_mismatch"]
        );
    }

    #[test]
    fn duplicate_rows_are_witnessed() {
        let report = verify_exports(
            &log(),
            records(),
            &[row(1, &[1, 2]), row(1, &[1, 2]), row(2, &[1, 3])],
            &CurriculumConfig::new(false),
        )
        .unwrap();
        assert_eq!(report.failure_classes, vec!["occurrence_order"]);
        assert_eq!(report.violations[0].subject, "sentence:S0001");
    }

    #[test]
    fn sparse_unit_ids_are_a_hard_error() {
        let mut units = records();
        units[2].canonical_id = UnitId(7);
        let err = verify_exports(&log(), units, &[], &CurriculumConfig::new(false))
            .expect_err("ids must be dense");
        assert!(matches!(err, LedgerError::Registry(_)));
    }
}
