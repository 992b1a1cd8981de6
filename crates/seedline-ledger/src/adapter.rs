//! Batch file adapter.
//!
//! Workers have written batches in several shapes over time. All of them
//! are read here and turned into one [`BatchProposal`]; nothing past this
//! module sees the raw shapes.
//!
//! Accepted:
//!
//! ```text
//! canonical  {"batchId", "range": {"start","end"}, "sentences": [{"sentenceId", "occurrences": [...]}]}
//! seed/lego  {"batch_id", "seeds": [{"seed_id", "legos": [{"target","known","type":"A"|"M","new","id","components"}]}]}
//! bare       [{"sentenceId", "occurrences": [["Quiero","I want"], ...]}, ...]
//! ```
//!
//! Occurrences and components may be `[target, known]` pairs or records.
//! A missing range is derived from the sentence ids present; a missing
//! claimed status means `new`.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use seedline_kernel::{Component, OccurrenceStatus, SentenceId, UnitId, UnitKindTag};

use crate::batch::{BatchProposal, ProposedOccurrence, SentenceProposal, SentenceRange};
use crate::jsonl::{JsonlError, read_checked_bytes};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Read(#[from] JsonlError),

    #[error("{origin}: unrecognized batch shape: {message}")]
    Shape { origin: String, message: String },

    #[error("{origin}: batch has no sentences and no range")]
    Empty { origin: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatch {
    Record(RawBatchRecord),
    Bare(Vec<RawSentence>),
}

#[derive(Deserialize)]
struct RawBatchRecord {
    #[serde(default, alias = "batchId", alias = "id")]
    batch_id: Option<String>,
    #[serde(default)]
    range: Option<RawRange>,
    #[serde(alias = "seeds")]
    sentences: Vec<RawSentence>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRange {
    Pair(SentenceId, SentenceId),
    Record {
        #[serde(alias = "from")]
        start: SentenceId,
        #[serde(alias = "to")]
        end: SentenceId,
    },
}

#[derive(Deserialize)]
struct RawSentence {
    #[serde(alias = "sentenceId", alias = "seed_id", alias = "seedId", alias = "id")]
    sentence_id: SentenceId,
    #[serde(alias = "legos", alias = "units")]
    occurrences: Vec<RawOccurrence>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOccurrence {
    Pair(String, String),
    Record(RawOccurrenceRecord),
}

#[derive(Deserialize)]
struct RawOccurrenceRecord {
    #[serde(alias = "targetText", alias = "target")]
    target_text: String,
    #[serde(alias = "knownText", alias = "known")]
    known_text: String,
    #[serde(default, alias = "type")]
    kind: Option<UnitKindTag>,
    #[serde(default)]
    components: Option<Vec<RawComponent>>,
    #[serde(default, alias = "claimedStatus", alias = "status")]
    claimed_status: Option<OccurrenceStatus>,
    #[serde(default)]
    new: Option<bool>,
    #[serde(default, alias = "claimedCanonicalId", alias = "canonicalId", alias = "id")]
    claimed_canonical_id: Option<UnitId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawComponent {
    Pair(String, String),
    Record(Component),
}

impl From<RawComponent> for Component {
    fn from(raw: RawComponent) -> Self {
        match raw {
            RawComponent::Pair(target, known) => Component::new(target, known),
            RawComponent::Record(component) => component,
        }
    }
}

impl From<RawOccurrence> for ProposedOccurrence {
    fn from(raw: RawOccurrence) -> Self {
        match raw {
            RawOccurrence::Pair(target, known) => ProposedOccurrence::atomic(target, known),
            RawOccurrence::Record(record) => {
                let components: Option<Vec<Component>> = record
                    .components
                    .map(|list| list.into_iter().map(Component::from).collect());
                let kind = record.kind.unwrap_or(match &components {
                    Some(list) if !list.is_empty() => UnitKindTag::Composite,
                    _ => UnitKindTag::Atomic,
                });
                let claimed_status = record.claimed_status.unwrap_or(match record.new {
                    Some(false) => OccurrenceStatus::Reference,
                    _ => OccurrenceStatus::New,
                });
                ProposedOccurrence {
                    target_text: record.target_text,
                    known_text: record.known_text,
                    kind,
                    components,
                    claimed_status,
                    claimed_canonical_id: record.claimed_canonical_id,
                }
            }
        }
    }
}

/// Turn any accepted batch shape into a [`BatchProposal`].
///
/// `origin` names the source in errors and is the batch id when the input
/// carries none.
pub fn adapt_batch(value: Value, origin: &str) -> Result<BatchProposal, AdapterError> {
    let raw: RawBatch = serde_json::from_value(value).map_err(|e| AdapterError::Shape {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    let (batch_id, range, raw_sentences) = match raw {
        RawBatch::Record(record) => (record.batch_id, record.range, record.sentences),
        RawBatch::Bare(sentences) => (None, None, sentences),
    };

    let sentences: Vec<SentenceProposal> = raw_sentences
        .into_iter()
        .map(|s| {
            SentenceProposal::new(
                s.sentence_id,
                s.occurrences.into_iter().map(ProposedOccurrence::from).collect(),
            )
        })
        .collect();

    let range = match range {
        Some(RawRange::Pair(start, end)) | Some(RawRange::Record { start, end }) => {
            SentenceRange::new(start, end)
        }
        None => derive_range(&sentences).ok_or_else(|| AdapterError::Empty {
            origin: origin.to_string(),
        })?,
    };

    Ok(BatchProposal {
        batch_id: batch_id.unwrap_or_else(|| origin.to_string()),
        range,
        sentences,
    })
}

fn derive_range(sentences: &[SentenceProposal]) -> Option<SentenceRange> {
    let start = sentences.iter().map(|s| s.sentence_id).min()?;
    let end = sentences.iter().map(|s| s.sentence_id).max()?;
    Some(SentenceRange::new(start, end))
}

pub fn adapt_batch_str(text: &str, origin: &str) -> Result<BatchProposal, AdapterError> {
    let value: Value = serde_json::from_str(text).map_err(|e| AdapterError::Shape {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    adapt_batch(value, origin)
}

/// Read one batch file. The file stem is the fallback batch id.
pub fn read_batch_from_path(path: impl AsRef<Path>) -> Result<BatchProposal, AdapterError> {
    let path = path.as_ref();
    let bytes = read_checked_bytes(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let origin = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    adapt_batch_str(&text, &origin)
}
