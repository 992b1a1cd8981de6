//! Deterministic batch merge.
//!
//! Batches are produced in parallel against stale registry snapshots, so
//! their `new`/`reference` claims and canonical ids cannot be trusted. The
//! merge replays every batch, sentence by sentence, through one registry in
//! sentence-range order; ownership and ids fall out of the replay. Arrival
//! order and thread scheduling never reach the result.
//!
//! ```text
//! batches ──validate (parallel)──▶ sort by range ──replay──▶ Registry + timeline
//!                                                     │
//!                                                     └──▶ MergeReport + ViolationReport
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use seedline_kernel::collision::sentence_pairs;
use seedline_kernel::unit::UnitRecordError;
use seedline_kernel::witness::failure_class;
use seedline_kernel::{
    CurriculumConfig, Occurrence, OccurrenceStatus, Registry, RegistryConfig, RegistryError,
    SentenceId, Severity, TilingMode, TilingResult, UnitId, ViolationReport, Witness,
    check_collisions, validate_tiling,
};

use crate::batch::{BatchCheck, BatchDefect, BatchProposal, SentenceRange, validate_batches};
use crate::export::OccurrenceRow;
use crate::sentences::SentenceLog;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("batch id `{0}` appears more than once")]
    DuplicateBatchId(String),

    #[error("batch `{first}` ({first_range}) overlaps batch `{second}` ({second_range})")]
    OverlappingRanges {
        first: String,
        first_range: SentenceRange,
        second: String,
        second_range: SentenceRange,
    },

    #[error("batch `{batch_id}` at {sentence_id}: {source}")]
    Registry {
        batch_id: String,
        sentence_id: SentenceId,
        #[source]
        source: RegistryError,
    },

    #[error("snapshot occurrence rows must be strictly increasing: {sentence_id} follows {previous}")]
    SnapshotOutOfOrder {
        previous: SentenceId,
        sentence_id: SentenceId,
    },

    #[error("snapshot row {sentence_id} references unit {unit_id}, which the unit export lacks")]
    SnapshotUnknownUnit {
        sentence_id: SentenceId,
        unit_id: UnitId,
    },

    #[error("snapshot unit {unit_id} is owned by {owner}, but no occurrence row there uses it")]
    SnapshotMissingOwnerRow { unit_id: UnitId, owner: SentenceId },

    #[error("batch `{batch_id}` at {sentence_id} position {position}: {source}")]
    InvalidOccurrence {
        batch_id: String,
        sentence_id: SentenceId,
        position: usize,
        #[source]
        source: UnitRecordError,
    },
}

/// How replay corrected a worker's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteKind {
    /// Claimed new; the owner was introduced by another batch or the base.
    CrossBatchDuplicate,
    /// Claimed new; the owner was introduced earlier in the same batch.
    InBatchDuplicate,
    /// Claimed reference; replay introduces the unit here.
    PromotedToNew,
    /// Claimed a canonical id that is not the one replay resolved.
    CanonicalIdRemapped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewrite {
    pub kind: RewriteKind,
    pub batch_id: String,
    pub sentence_id: SentenceId,
    pub position: usize,
    pub target_text: String,
    pub canonical_id: UnitId,
    pub owner_sentence_id: SentenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_canonical_id: Option<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backfill {
    pub batch_id: String,
    pub sentence_id: SentenceId,
    pub canonical_id: UnitId,
    pub target_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedBatch {
    pub batch_id: String,
    pub range: SentenceRange,
    pub defects: Vec<BatchDefect>,
}

/// A valid batch left unmerged because an earlier range was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredBatch {
    pub batch_id: String,
    pub range: SentenceRange,
    pub blocked_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilingRegression {
    pub batch_id: String,
    pub sentence_id: SentenceId,
    pub result: TilingResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub merged_at: DateTime<Utc>,
    /// False when any batch was rejected or deferred, or replay broke tiling.
    pub complete: bool,
    pub merged_batches: Vec<String>,
    pub rejected: Vec<RejectedBatch>,
    pub deferred: Vec<DeferredBatch>,
    pub rewrites: Vec<Rewrite>,
    pub backfills: Vec<Backfill>,
    pub tiling_regressions: Vec<TilingRegression>,
    pub units_created: usize,
    pub units_total: usize,
}

impl MergeReport {
    pub fn rewrites_of(&self, kind: RewriteKind) -> impl Iterator<Item = &Rewrite> {
        self.rewrites.iter().filter(move |r| r.kind == kind)
    }
}

/// The final ordered occurrence list for one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceOccurrences {
    pub sentence_id: SentenceId,
    pub occurrences: Vec<Occurrence>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub registry: Registry,
    pub timeline: Vec<SentenceOccurrences>,
    pub report: MergeReport,
    pub violations: ViolationReport,
}

impl MergeOutcome {
    /// Keep the registry and timeline as the base of a later merge.
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            registry: self.registry,
            timeline: self.timeline,
        }
    }
}

/// A previous merge's exports: the registry and the timeline that owns
/// every unit in it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    registry: Registry,
    timeline: Vec<SentenceOccurrences>,
}

impl Snapshot {
    /// Rebuild a snapshot from exported occurrence rows. Statuses are
    /// re-derived from ownership, and every unit's owner must have a row that
    /// uses it.
    pub fn new(registry: Registry, rows: &[OccurrenceRow]) -> Result<Self, MergeError> {
        let mut timeline: Vec<SentenceOccurrences> = Vec::with_capacity(rows.len());
        for row in rows {
            let sentence_id = row.sentence_id;
            if let Some(last) = timeline.last()
                && sentence_id <= last.sentence_id
            {
                return Err(MergeError::SnapshotOutOfOrder {
                    previous: last.sentence_id,
                    sentence_id,
                });
            }
            let mut seen_here = BTreeSet::new();
            let mut occurrences = Vec::with_capacity(row.canonical_ids.len());
            for &unit_id in &row.canonical_ids {
                let unit = registry
                    .get(unit_id)
                    .ok_or(MergeError::SnapshotUnknownUnit {
                        sentence_id,
                        unit_id,
                    })?;
                occurrences.push(Occurrence {
                    canonical_id: unit_id,
                    status: occurrence_status(unit.introduced_at, sentence_id, unit_id, &mut seen_here),
                });
            }
            timeline.push(SentenceOccurrences {
                sentence_id,
                occurrences,
            });
        }

        for unit in registry.units() {
            let owned = timeline
                .binary_search_by_key(&unit.introduced_at, |s| s.sentence_id)
                .is_ok_and(|i| {
                    timeline[i]
                        .occurrences
                        .iter()
                        .any(|o| o.canonical_id == unit.id)
                });
            if !owned {
                return Err(MergeError::SnapshotMissingOwnerRow {
                    unit_id: unit.id,
                    owner: unit.introduced_at,
                });
            }
        }
        Ok(Self { registry, timeline })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn timeline(&self) -> &[SentenceOccurrences] {
        &self.timeline
    }
}

/// `new` exactly for the first use of a unit in the sentence that owns it.
fn occurrence_status(
    owner: SentenceId,
    sentence_id: SentenceId,
    unit_id: UnitId,
    seen_here: &mut BTreeSet<UnitId>,
) -> OccurrenceStatus {
    let first_here = seen_here.insert(unit_id);
    if owner == sentence_id && first_here {
        OccurrenceStatus::New
    } else {
        OccurrenceStatus::Reference
    }
}

/// Merge `batches` onto `base` (or an empty registry).
///
/// The resulting timeline holds every sentence of the base that this run did
/// not replay, plus every replayed sentence, in sentence order.
pub fn merge_batches(
    log: &SentenceLog,
    batches: Vec<BatchProposal>,
    base: Option<Snapshot>,
    config: &CurriculumConfig,
) -> Result<MergeOutcome, MergeError> {
    check_batch_ids(&batches)?;

    let checks = validate_batches(&batches, log, config.tiling.mode);
    let mut ordered: Vec<(BatchProposal, BatchCheck)> = batches.into_iter().zip(checks).collect();
    ordered.sort_by(|a, b| {
        (a.0.range.start, a.0.range.end, &a.0.batch_id).cmp(&(
            b.0.range.start,
            b.0.range.end,
            &b.0.batch_id,
        ))
    });
    check_overlaps(&ordered)?;

    let (mut registry, base_timeline) = match base {
        Some(snapshot) => (snapshot.registry, snapshot.timeline),
        None => (Registry::new(RegistryConfig::from(config)), Vec::new()),
    };
    let units_before = registry.len();
    let mut replay = Replay {
        mode: config.tiling.mode,
        timeline: Vec::new(),
        rewrites: Vec::new(),
        backfills: Vec::new(),
        tiling_regressions: Vec::new(),
    };

    let mut merged_batches = Vec::new();
    let mut rejected = Vec::new();
    let mut deferred = Vec::new();
    let mut blocked_by: Option<String> = None;

    for (batch, check) in ordered {
        if !check.is_valid() {
            tracing::warn!(
                batch = %batch.batch_id,
                range = %batch.range,
                defects = check.defects.len(),
                "batch rejected"
            );
            blocked_by.get_or_insert_with(|| batch.batch_id.clone());
            rejected.push(RejectedBatch {
                batch_id: batch.batch_id,
                range: batch.range,
                defects: check.defects,
            });
            continue;
        }
        if let Some(blocker) = &blocked_by {
            tracing::warn!(
                batch = %batch.batch_id,
                blocked_by = %blocker,
                "batch deferred behind a rejected range"
            );
            deferred.push(DeferredBatch {
                batch_id: batch.batch_id,
                range: batch.range,
                blocked_by: blocker.clone(),
            });
            continue;
        }

        let created_before = registry.len();
        replay.batch(&mut registry, log, &batch)?;
        tracing::info!(
            batch = %batch.batch_id,
            range = %batch.range,
            sentences = batch.sentences.len(),
            units_created = registry.len() - created_before,
            "batch merged"
        );
        merged_batches.push(batch.batch_id);
    }

    let Replay {
        timeline: replayed,
        rewrites,
        backfills,
        tiling_regressions,
        ..
    } = replay;
    let mut by_sentence: BTreeMap<SentenceId, SentenceOccurrences> = base_timeline
        .into_iter()
        .map(|s| (s.sentence_id, s))
        .collect();
    by_sentence.extend(replayed.into_iter().map(|s| (s.sentence_id, s)));
    let timeline: Vec<SentenceOccurrences> = by_sentence.into_values().collect();

    let report = MergeReport {
        merged_at: Utc::now(),
        complete: rejected.is_empty() && deferred.is_empty() && tiling_regressions.is_empty(),
        merged_batches,
        rejected,
        deferred,
        rewrites,
        backfills,
        tiling_regressions,
        units_created: registry.len() - units_before,
        units_total: registry.len(),
    };
    let violations = collect_violations(&registry, log, &report, config);

    Ok(MergeOutcome {
        registry,
        timeline,
        report,
        violations,
    })
}

fn check_batch_ids(batches: &[BatchProposal]) -> Result<(), MergeError> {
    let mut seen = BTreeSet::new();
    for batch in batches {
        if !seen.insert(batch.batch_id.as_str()) {
            return Err(MergeError::DuplicateBatchId(batch.batch_id.clone()));
        }
    }
    Ok(())
}

/// `ordered` is sorted by range start, so only neighbours can overlap first.
fn check_overlaps(ordered: &[(BatchProposal, BatchCheck)]) -> Result<(), MergeError> {
    let mut furthest: Option<&BatchProposal> = None;
    for (batch, _) in ordered {
        if !batch.range.is_well_formed() {
            continue;
        }
        if let Some(previous) = furthest
            && previous.range.overlaps(&batch.range)
        {
            return Err(MergeError::OverlappingRanges {
                first: previous.batch_id.clone(),
                first_range: previous.range,
                second: batch.batch_id.clone(),
                second_range: batch.range,
            });
        }
        if furthest.is_none_or(|f| batch.range.end > f.range.end) {
            furthest = Some(batch);
        }
    }
    Ok(())
}

struct Replay {
    mode: TilingMode,
    timeline: Vec<SentenceOccurrences>,
    rewrites: Vec<Rewrite>,
    backfills: Vec<Backfill>,
    tiling_regressions: Vec<TilingRegression>,
}

impl Replay {
    fn batch(
        &mut self,
        registry: &mut Registry,
        log: &SentenceLog,
        batch: &BatchProposal,
    ) -> Result<(), MergeError> {
        for proposal in &batch.sentences {
            let sentence_id = proposal.sentence_id;
            let mut occurrences = Vec::with_capacity(proposal.occurrences.len());
            let mut seen_here = BTreeSet::new();

            for (position, claimed) in proposal.occurrences.iter().enumerate() {
                let unit_proposal =
                    claimed
                        .to_proposal()
                        .map_err(|source| MergeError::InvalidOccurrence {
                            batch_id: batch.batch_id.clone(),
                            sentence_id,
                            position,
                            source,
                        })?;
                let components = unit_proposal.kind.components().cloned();
                let registration = registry.register(sentence_id, unit_proposal).map_err(
                    |source| MergeError::Registry {
                        batch_id: batch.batch_id.clone(),
                        sentence_id,
                        source,
                    },
                )?;
                let unit_id = registration.unit_id;
                let unit = registry.get(unit_id).ok_or_else(|| MergeError::Registry {
                    batch_id: batch.batch_id.clone(),
                    sentence_id,
                    source: RegistryError::UnknownUnit(unit_id),
                })?;
                let owner = unit.introduced_at;
                let target_text = unit.target_text.clone();
                let needs_backfill = !registration.is_new && !unit.is_composite();
                let status = occurrence_status(owner, sentence_id, unit_id, &mut seen_here);

                let rewrite_kind = match (claimed.claimed_status, status) {
                    (OccurrenceStatus::New, OccurrenceStatus::Reference) => {
                        if batch.range.contains(owner) {
                            Some(RewriteKind::InBatchDuplicate)
                        } else {
                            Some(RewriteKind::CrossBatchDuplicate)
                        }
                    }
                    (OccurrenceStatus::Reference, OccurrenceStatus::New) => {
                        Some(RewriteKind::PromotedToNew)
                    }
                    _ => None,
                };
                let remapped = claimed
                    .claimed_canonical_id
                    .filter(|claimed_id| *claimed_id != unit_id)
                    .map(|_| RewriteKind::CanonicalIdRemapped);
                for kind in rewrite_kind.into_iter().chain(remapped) {
                    tracing::debug!(
                        batch = %batch.batch_id,
                        sentence = %sentence_id,
                        position,
                        unit = %unit_id,
                        ?kind,
                        "occurrence rewritten"
                    );
                    self.rewrites.push(Rewrite {
                        kind,
                        batch_id: batch.batch_id.clone(),
                        sentence_id,
                        position,
                        target_text: target_text.clone(),
                        canonical_id: unit_id,
                        owner_sentence_id: owner,
                        claimed_canonical_id: claimed.claimed_canonical_id,
                    });
                }

                if needs_backfill && let Some(components) = components {
                    registry
                        .backfill_components(unit_id, components)
                        .map_err(|source| MergeError::Registry {
                            batch_id: batch.batch_id.clone(),
                            sentence_id,
                            source,
                        })?;
                    tracing::debug!(unit = %unit_id, sentence = %sentence_id, "components backfilled");
                    self.backfills.push(Backfill {
                        batch_id: batch.batch_id.clone(),
                        sentence_id,
                        canonical_id: unit_id,
                        target_text,
                    });
                }

                occurrences.push(Occurrence {
                    canonical_id: unit_id,
                    status,
                });
            }

            if let Some(sentence) = log.get(sentence_id) {
                let canonical_texts: Vec<&str> = occurrences
                    .iter()
                    .filter_map(|o| registry.get(o.canonical_id))
                    .map(|u| u.target_text.as_str())
                    .collect();
                let result = validate_tiling(sentence, canonical_texts, self.mode);
                if !result.ok {
                    tracing::warn!(sentence = %sentence_id, "tiling broke after rewrite");
                    self.tiling_regressions.push(TilingRegression {
                        batch_id: batch.batch_id.clone(),
                        sentence_id,
                        result,
                    });
                }
            }

            self.timeline.push(SentenceOccurrences {
                sentence_id,
                occurrences,
            });
        }
        Ok(())
    }
}

fn collect_violations(
    registry: &Registry,
    log: &SentenceLog,
    report: &MergeReport,
    config: &CurriculumConfig,
) -> ViolationReport {
    let mut witnesses: Vec<Witness> = registry
        .collision_flags()
        .iter()
        .map(|flag| flag.witness())
        .collect();

    let sentence_level = check_collisions(&sentence_pairs(log.iter()), config.collision.case_sensitive);
    witnesses.extend(sentence_level.iter().map(|v| v.witness()));

    for rejected in &report.rejected {
        let reasons: Vec<String> = rejected.defects.iter().map(ToString::to_string).collect();
        witnesses.push(Witness::new(
            failure_class::BATCH_STRUCTURALLY_INVALID,
            format!("batch:{}", rejected.batch_id),
            format!(
                "batch {} ({}) rejected with {} defect(s)",
                rejected.batch_id,
                rejected.range,
                reasons.len()
            ),
            Some(json!({ "range": rejected.range, "defects": reasons })),
            Severity::Error,
        ));
    }

    for regression in &report.tiling_regressions {
        if let Some(witness) = regression
            .result
            .witness(format!("sentence:{}", regression.sentence_id))
        {
            witnesses.push(witness);
        }
    }

    for rewrite in report.rewrites_of(RewriteKind::CrossBatchDuplicate) {
        witnesses.push(Witness::new(
            failure_class::CROSS_BATCH_DUPLICATE,
            format!("sentence:{}/position:{}", rewrite.sentence_id, rewrite.position),
            format!(
                "{:?} claimed new at {} but is owned by {}",
                rewrite.target_text, rewrite.sentence_id, rewrite.owner_sentence_id
            ),
            Some(json!({
                "canonicalId": rewrite.canonical_id,
                "owner": rewrite.owner_sentence_id,
            })),
            Severity::Info,
        ));
    }

    ViolationReport::from_witnesses(witnesses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{ProposedOccurrence, SentenceProposal};
    use seedline_kernel::{Component, Sentence};

    fn config() -> CurriculumConfig {
        CurriculumConfig::new(false)
    }

    fn log() -> SentenceLog {
        SentenceLog::new(vec![
            Sentence::new(SentenceId(1), "I want to speak.", "Quiero hablar."),
            Sentence::new(SentenceId(2), "I want to eat.", "Quiero comer."),
            Sentence::new(SentenceId(3), "I would like to eat.", "Me gustaría comer."),
            Sentence::new(SentenceId(4), "I would like to speak.", "Me gustaría hablar."),
        ])
        .unwrap()
    }

    fn sentence(id: u32, parts: &[(&str, &str)]) -> SentenceProposal {
        SentenceProposal::new(
            SentenceId(id),
            parts
                .iter()
                .map(|(t, k)| ProposedOccurrence::atomic(*t, *k))
                .collect(),
        )
    }

    fn batch(id: &str, start: u32, end: u32, sentences: Vec<SentenceProposal>) -> BatchProposal {
        BatchProposal {
            batch_id: id.into(),
            range: SentenceRange::new(SentenceId(start), SentenceId(end)),
            sentences,
        }
    }

    fn first_half() -> BatchProposal {
        batch(
            "a",
            1,
            2,
            vec![
                sentence(1, &[("Quiero", "I want"), ("hablar", "to speak")]),
                sentence(2, &[("Quiero", "I want"), ("comer", "to eat")]),
            ],
        )
    }

    fn second_half() -> BatchProposal {
        batch(
            "b",
            3,
            4,
            vec![
                sentence(3, &[("Me gustaría", "I would like"), ("comer", "to eat")]),
                sentence(4, &[("Me gustaría", "I would like"), ("hablar", "to speak")]),
            ],
        )
    }

    #[test]
    fn replays_in_range_order_regardless_of_arrival() {
        let forward = merge_batches(&log(), vec![first_half(), second_half()], None, &config())
            .expect("merge");
        let backward = merge_batches(&log(), vec![second_half(), first_half()], None, &config())
            .expect("merge");
        assert_eq!(forward.registry.to_records(), backward.registry.to_records());
        assert_eq!(forward.timeline, backward.timeline);
        assert!(forward.report.complete);
        assert_eq!(forward.report.merged_batches, vec!["a", "b"]);

        let comer = forward.registry.lookup_text("comer").unwrap();
        assert_eq!(comer.introduced_at, SentenceId(2));
        assert_eq!(comer.id, UnitId(3));
    }

    #[test]
    fn duplicate_claims_are_rewritten_to_references() {
        let outcome =
            merge_batches(&log(), vec![first_half(), second_half()], None, &config()).unwrap();
        let kinds: Vec<(SentenceId, usize, RewriteKind)> = outcome
            .report
            .rewrites
            .iter()
            .map(|r| (r.sentence_id, r.position, r.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (SentenceId(2), 0, RewriteKind::InBatchDuplicate),
                (SentenceId(3), 1, RewriteKind::CrossBatchDuplicate),
                (SentenceId(4), 0, RewriteKind::InBatchDuplicate),
                (SentenceId(4), 1, RewriteKind::CrossBatchDuplicate),
            ]
        );
        assert_eq!(
            outcome.timeline[1].occurrences[0].status,
            OccurrenceStatus::Reference
        );
        assert_eq!(outcome.violations.count(Severity::Info), 2);
        assert!(outcome.violations.is_accepted());
    }

    #[test]
    fn reference_claim_that_introduces_is_promoted() {
        let mut first = first_half();
        first.sentences[0].occurrences[1] = ProposedOccurrence::atomic("hablar", "to speak")
            .claiming(OccurrenceStatus::Reference, Some(UnitId(9)));
        let outcome = merge_batches(&log(), vec![first], None, &config()).unwrap();
        let kinds: Vec<RewriteKind> = outcome.report.rewrites.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RewriteKind::PromotedToNew,
                RewriteKind::CanonicalIdRemapped,
                RewriteKind::InBatchDuplicate,
            ]
        );
    }

    #[test]
    fn rejected_batch_defers_later_ranges() {
        let mut broken = first_half();
        broken.sentences[1].occurrences.pop();
        let outcome = merge_batches(&log(), vec![second_half(), broken], None, &config()).unwrap();
        assert!(!outcome.report.complete);
        assert_eq!(outcome.report.rejected[0].batch_id, "a");
        assert_eq!(outcome.report.deferred[0].batch_id, "b");
        assert_eq!(outcome.report.deferred[0].blocked_by, "a");
        assert!(outcome.registry.is_empty());
        assert!(!outcome.violations.is_accepted());
        assert_eq!(
            outcome.violations.failure_classes,
            vec!["batch_structurally_invalid"]
        );
    }

    #[test]
    fn batch_set_errors_abort() {
        let err = merge_batches(&log(), vec![first_half(), first_half()], None, &config())
            .expect_err("duplicate ids");
        assert!(matches!(err, MergeError::DuplicateBatchId(id) if id == "a"));

        let mut overlapping = second_half();
        overlapping.range = SentenceRange::new(SentenceId(2), SentenceId(4));
        let err = merge_batches(&log(), vec![first_half(), overlapping], None, &config())
            .expect_err("overlap");
        assert!(matches!(err, MergeError::OverlappingRanges { .. }));
    }

    #[test]
    fn later_composite_backfills_an_atomic_unit() {
        let first = batch(
            "a",
            1,
            3,
            vec![
                sentence(1, &[("Quiero", "I want"), ("hablar", "to speak")]),
                sentence(2, &[("Quiero", "I want"), ("comer", "to eat")]),
                sentence(3, &[("Me gustaría", "I would like"), ("comer", "to eat")]),
            ],
        );
        let mut second = batch(
            "b",
            4,
            4,
            vec![sentence(4, &[("Me gustaría", "I would like"), ("hablar", "to speak")])],
        );
        second.sentences[0].occurrences[0] = ProposedOccurrence::composite(
            "Me gustaría",
            "I would like",
            vec![
                Component::new("Me", "to me"),
                Component::new("gustaría", "it would please"),
            ],
        )
        .claiming(OccurrenceStatus::Reference, None);
        let outcome = merge_batches(&log(), vec![first, second], None, &config()).unwrap();
        assert_eq!(outcome.report.backfills.len(), 1);
        let unit = outcome.registry.lookup_text("me gustaría").unwrap();
        assert!(unit.is_composite());
        assert_eq!(unit.introduced_at, SentenceId(3));
    }

    #[test]
    fn stale_snapshot_cannot_move_ownership_earlier() {
        let late = merge_batches(&log(), vec![second_half()], None, &config()).unwrap();
        let err = merge_batches(&log(), vec![first_half()], Some(late.into_snapshot()), &config())
            .expect_err("hablar is owned by S0004 in the snapshot");
        assert!(matches!(
            err,
            MergeError::Registry {
                source: RegistryError::OwnershipRegression { .. },
                ..
            }
        ));
    }

    #[test]
    fn incremental_merge_keeps_earlier_sentences() {
        let first = merge_batches(&log(), vec![first_half()], None, &config()).unwrap();
        let rows = crate::export::occurrence_rows(&first.timeline);
        let snapshot = Snapshot::new(first.registry.clone(), &rows).unwrap();
        assert_eq!(snapshot.timeline(), first.timeline.as_slice());

        let second = merge_batches(&log(), vec![second_half()], Some(snapshot), &config()).unwrap();
        let sentences: Vec<u32> = second.timeline.iter().map(|s| s.sentence_id.value()).collect();
        assert_eq!(sentences, vec![1, 2, 3, 4]);

        let whole =
            merge_batches(&log(), vec![first_half(), second_half()], None, &config()).unwrap();
        assert_eq!(second.timeline, whole.timeline);
        assert_eq!(second.registry.to_records(), whole.registry.to_records());
    }

    #[test]
    fn snapshot_rows_must_cover_every_owner() {
        let first = merge_batches(&log(), vec![first_half()], None, &config()).unwrap();
        let rows = crate::export::occurrence_rows(&first.timeline);

        let err = Snapshot::new(first.registry.clone(), &rows[..1]).expect_err("S0002 row dropped");
        assert!(matches!(
            err,
            MergeError::SnapshotMissingOwnerRow { unit_id: UnitId(3), owner: SentenceId(2) }
        ));

        let reversed: Vec<OccurrenceRow> = rows.iter().rev().cloned().collect();
        let err = Snapshot::new(first.registry.clone(), &reversed).expect_err("out of order");
        assert!(matches!(err, MergeError::SnapshotOutOfOrder { .. }));

        let mut stray = rows.clone();
        stray[0].canonical_ids.push(UnitId(9));
        let err = Snapshot::new(first.registry, &stray).expect_err("unknown unit");
        assert!(matches!(
            err,
            MergeError::SnapshotUnknownUnit { unit_id: UnitId(9), .. }
        ));
    }
}
