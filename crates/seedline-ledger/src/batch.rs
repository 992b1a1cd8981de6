//! Decomposition batches and their structural pre-validation.
//!
//! A batch is one worker's proposal for a contiguous sentence range. Before
//! anything touches the shared registry, each batch is checked on its own:
//! range well-formed, every sentence in range covered exactly once, every
//! decomposition tiling its sentence, every composite tiled by its
//! components. The checks are pure and read only the sentence log, so all
//! batches are checked in parallel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use seedline_kernel::unit::UnitRecordError;
use seedline_kernel::{
    Component, OccurrenceStatus, SentenceId, TilingMode, TilingResult, UnitId, UnitKind,
    UnitKindTag, UnitProposal, normalize, validate_components, validate_tiling,
};

use crate::sentences::SentenceLog;

/// Inclusive sentence-id range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRange {
    pub start: SentenceId,
    pub end: SentenceId,
}

impl SentenceRange {
    pub fn new(start: SentenceId, end: SentenceId) -> Self {
        Self { start, end }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, id: SentenceId) -> bool {
        self.start <= id && id <= self.end
    }

    pub fn overlaps(&self, other: &SentenceRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for SentenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// One proposed unit use, as a worker reported it.
///
/// `claimed_status` and `claimed_canonical_id` are the worker's view from its
/// own snapshot; replay re-derives both and never trusts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedOccurrence {
    pub target_text: String,
    pub known_text: String,
    pub kind: UnitKindTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
    pub claimed_status: OccurrenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_canonical_id: Option<UnitId>,
}

impl ProposedOccurrence {
    pub fn atomic(target_text: impl Into<String>, known_text: impl Into<String>) -> Self {
        Self {
            target_text: target_text.into(),
            known_text: known_text.into(),
            kind: UnitKindTag::Atomic,
            components: None,
            claimed_status: OccurrenceStatus::New,
            claimed_canonical_id: None,
        }
    }

    pub fn composite(
        target_text: impl Into<String>,
        known_text: impl Into<String>,
        components: Vec<Component>,
    ) -> Self {
        Self {
            kind: UnitKindTag::Composite,
            components: Some(components),
            ..Self::atomic(target_text, known_text)
        }
    }

    pub fn claiming(mut self, status: OccurrenceStatus, canonical_id: Option<UnitId>) -> Self {
        self.claimed_status = status;
        self.claimed_canonical_id = canonical_id;
        self
    }

    pub fn to_proposal(&self) -> Result<UnitProposal, UnitRecordError> {
        Ok(UnitProposal {
            target_text: self.target_text.clone(),
            known_text: self.known_text.clone(),
            kind: UnitKind::from_parts(self.kind, self.components.clone())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceProposal {
    pub sentence_id: SentenceId,
    pub occurrences: Vec<ProposedOccurrence>,
}

impl SentenceProposal {
    pub fn new(sentence_id: SentenceId, occurrences: Vec<ProposedOccurrence>) -> Self {
        Self {
            sentence_id,
            occurrences,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProposal {
    pub batch_id: String,
    pub range: SentenceRange,
    pub sentences: Vec<SentenceProposal>,
}

/// Why a batch cannot be merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "defect", rename_all = "snake_case")]
pub enum BatchDefect {
    #[error("range {range} is empty")]
    EmptyRange { range: SentenceRange },

    #[error("{sentence_id} lies outside the batch range")]
    OutsideRange { sentence_id: SentenceId },

    #[error("{sentence_id} follows {previous}; sentences must be strictly increasing")]
    NotIncreasing {
        sentence_id: SentenceId,
        previous: SentenceId,
    },

    #[error("{sentence_id} is not in the sentence log")]
    UnknownSentence { sentence_id: SentenceId },

    #[error("{sentence_id} is in range but has no decomposition")]
    Uncovered { sentence_id: SentenceId },

    #[error("{sentence_id} position {position}: unit text is empty after normalization")]
    EmptyUnitText { sentence_id: SentenceId, position: usize },

    #[error("{sentence_id} position {position}: {reason}")]
    InvalidKind {
        sentence_id: SentenceId,
        position: usize,
        reason: String,
    },

    #[error("{sentence_id} does not tile: remainder {:?}, surplus {:?}", .result.remainder, .result.surplus)]
    TilingMismatch {
        sentence_id: SentenceId,
        result: TilingResult,
    },

    #[error("{sentence_id} position {position}: components do not tile the composite: remainder {:?}, surplus {:?}", .result.remainder, .result.surplus)]
    ComponentsDoNotTile {
        sentence_id: SentenceId,
        position: usize,
        result: TilingResult,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheck {
    pub batch_id: String,
    pub range: SentenceRange,
    pub sentences_checked: usize,
    pub defects: Vec<BatchDefect>,
}

impl BatchCheck {
    pub fn is_valid(&self) -> bool {
        self.defects.is_empty()
    }
}

/// Check one batch against the sentence log.
pub fn validate_batch(batch: &BatchProposal, log: &SentenceLog, mode: TilingMode) -> BatchCheck {
    let mut defects = Vec::new();
    let range = batch.range;

    if !range.is_well_formed() {
        defects.push(BatchDefect::EmptyRange { range });
    }

    let mut previous: Option<SentenceId> = None;
    for proposal in &batch.sentences {
        let sentence_id = proposal.sentence_id;
        if let Some(previous) = previous
            && sentence_id <= previous
        {
            defects.push(BatchDefect::NotIncreasing {
                sentence_id,
                previous,
            });
        }
        previous = Some(sentence_id);

        if !range.contains(sentence_id) {
            defects.push(BatchDefect::OutsideRange { sentence_id });
        }
        let Some(sentence) = log.get(sentence_id) else {
            defects.push(BatchDefect::UnknownSentence { sentence_id });
            continue;
        };

        let tiling = validate_tiling(
            sentence,
            proposal.occurrences.iter().map(|o| o.target_text.as_str()),
            mode,
        );
        if !tiling.ok {
            defects.push(BatchDefect::TilingMismatch {
                sentence_id,
                result: tiling,
            });
        }

        for (position, occurrence) in proposal.occurrences.iter().enumerate() {
            if normalize(&occurrence.target_text).is_empty() {
                defects.push(BatchDefect::EmptyUnitText {
                    sentence_id,
                    position,
                });
            }
            match occurrence.to_proposal() {
                Err(reason) => defects.push(BatchDefect::InvalidKind {
                    sentence_id,
                    position,
                    reason: reason.to_string(),
                }),
                Ok(proposal) => {
                    if let Some(components) = proposal.kind.components() {
                        let result =
                            validate_components(&occurrence.target_text, components, mode);
                        if !result.ok {
                            defects.push(BatchDefect::ComponentsDoNotTile {
                                sentence_id,
                                position,
                                result,
                            });
                        }
                    }
                }
            }
        }
    }

    if range.is_well_formed() {
        for sentence in log.in_range(&range) {
            if !batch
                .sentences
                .iter()
                .any(|p| p.sentence_id == sentence.id)
            {
                defects.push(BatchDefect::Uncovered {
                    sentence_id: sentence.id,
                });
            }
        }
    }

    BatchCheck {
        batch_id: batch.batch_id.clone(),
        range,
        sentences_checked: batch.sentences.len(),
        defects,
    }
}

/// Check every batch in parallel. Results come back in input order.
pub fn validate_batches(
    batches: &[BatchProposal],
    log: &SentenceLog,
    mode: TilingMode,
) -> Vec<BatchCheck> {
    batches
        .par_iter()
        .map(|batch| validate_batch(batch, log, mode))
        .collect()
}
