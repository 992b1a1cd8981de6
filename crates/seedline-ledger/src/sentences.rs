//! The ordered sentence log every batch and export is checked against.

use seedline_kernel::{Sentence, SentenceId};
use std::path::Path;

use crate::batch::SentenceRange;
use crate::jsonl::{JsonlError, read_jsonl_from_path};

#[derive(Debug, thiserror::Error)]
pub enum SentenceLogError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("sentence ids must be strictly increasing: {id} follows {previous}")]
    OutOfOrder { previous: SentenceId, id: SentenceId },
}

/// Sentences sorted by strictly increasing id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceLog {
    sentences: Vec<Sentence>,
}

impl SentenceLog {
    pub fn new(sentences: Vec<Sentence>) -> Result<Self, SentenceLogError> {
        for pair in sentences.windows(2) {
            if pair[1].id <= pair[0].id {
                return Err(SentenceLogError::OutOfOrder {
                    previous: pair[0].id,
                    id: pair[1].id,
                });
            }
        }
        Ok(Self { sentences })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SentenceLogError> {
        let sentences = read_jsonl_from_path(path)?;
        Self::new(sentences)
    }

    pub fn get(&self, id: SentenceId) -> Option<&Sentence> {
        self.sentences
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|i| &self.sentences[i])
    }

    /// Sentences whose ids fall inside `range`.
    pub fn in_range(&self, range: &SentenceRange) -> &[Sentence] {
        let start = self.sentences.partition_point(|s| s.id < range.start);
        let end = self.sentences.partition_point(|s| s.id <= range.end);
        &self.sentences[start..end.max(start)]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sentence> {
        self.sentences.iter()
    }

    pub fn as_slice(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> SentenceLog {
        SentenceLog::new(vec![
            Sentence::new(SentenceId(1), "Yes.", "Sí."),
            Sentence::new(SentenceId(2), "No.", "No."),
            Sentence::new(SentenceId(5), "Thanks.", "Gracias."),
        ])
        .expect("ordered")
    }

    #[test]
    fn rejects_non_increasing_ids() {
        let err = SentenceLog::new(vec![
            Sentence::new(SentenceId(2), "a", "a"),
            Sentence::new(SentenceId(2), "b", "b"),
        ])
        .expect_err("duplicate id");
        assert!(err.to_string().contains("S0002 follows S0002"));
    }

    #[test]
    fn range_and_lookup() {
        let log = log();
        assert_eq!(log.get(SentenceId(5)).unwrap().target_text, "Gracias.");
        assert!(log.get(SentenceId(3)).is_none());
        let range = SentenceRange::new(SentenceId(2), SentenceId(4));
        let ids: Vec<_> = log.in_range(&range).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![SentenceId(2)]);
    }
}
