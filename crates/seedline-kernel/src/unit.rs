//! Curriculum records: sentences, canonical units, occurrences, practice
//! phrases, and the flat export row for a unit.

use serde::{Deserialize, Serialize};

use crate::ids::{SentenceId, UnitId};
use crate::normalize::{NormalizedText, normalize};

/// One source sentence pair. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    #[serde(alias = "seed_id", alias = "sentenceId")]
    pub id: SentenceId,
    #[serde(alias = "known", alias = "knownText")]
    pub known_text: String,
    #[serde(alias = "target", alias = "targetText")]
    pub target_text: String,
}

impl Sentence {
    pub fn new(
        id: SentenceId,
        known_text: impl Into<String>,
        target_text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            known_text: known_text.into(),
            target_text: target_text.into(),
        }
    }
}

/// One (text, meaning) part of a composite unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(alias = "target", alias = "targetText")]
    pub target_text: String,
    #[serde(alias = "known", alias = "knownText")]
    pub known_text: String,
}

impl Component {
    pub fn new(target_text: impl Into<String>, known_text: impl Into<String>) -> Self {
        Self {
            target_text: target_text.into(),
            known_text: known_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentsError {
    #[error("a composite unit needs at least one component")]
    Empty,
}

/// Ordered, non-empty component list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Components(Vec<Component>);

impl Components {
    pub fn new(components: Vec<Component>) -> Result<Self, ComponentsError> {
        if components.is_empty() {
            return Err(ComponentsError::Empty);
        }
        Ok(Self(components))
    }

    pub fn as_slice(&self) -> &[Component] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Component> {
        self.0
    }
}

impl<'de> Deserialize<'de> for Components {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Component>::deserialize(deserializer)?;
        Components::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Whether a unit is taught as an indivisible chunk or explained through
/// components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    Atomic,
    Composite(Components),
}

impl UnitKind {
    pub fn tag(&self) -> UnitKindTag {
        match self {
            UnitKind::Atomic => UnitKindTag::Atomic,
            UnitKind::Composite(_) => UnitKindTag::Composite,
        }
    }

    pub fn components(&self) -> Option<&Components> {
        match self {
            UnitKind::Atomic => None,
            UnitKind::Composite(components) => Some(components),
        }
    }

    /// Rebuild a kind from its flat parts.
    pub fn from_parts(
        tag: UnitKindTag,
        components: Option<Vec<Component>>,
    ) -> Result<Self, UnitRecordError> {
        match (tag, components) {
            (UnitKindTag::Atomic, None) => Ok(UnitKind::Atomic),
            (UnitKindTag::Atomic, Some(list)) if list.is_empty() => Ok(UnitKind::Atomic),
            (UnitKindTag::Atomic, Some(_)) => Err(UnitRecordError::AtomicWithComponents),
            (UnitKindTag::Composite, None) => Err(UnitRecordError::CompositeWithoutComponents),
            (UnitKindTag::Composite, Some(list)) => Components::new(list)
                .map(UnitKind::Composite)
                .map_err(|_| UnitRecordError::CompositeWithoutComponents),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKindTag {
    #[serde(alias = "A", alias = "a")]
    Atomic,
    #[serde(alias = "M", alias = "m")]
    Composite,
}

impl UnitKindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKindTag::Atomic => "atomic",
            UnitKindTag::Composite => "composite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitRecordError {
    #[error("composite unit is missing its components")]
    CompositeWithoutComponents,

    #[error("atomic unit must not carry components")]
    AtomicWithComponents,
}

/// A canonical unit. Identity is the normalized target text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub target_text: String,
    pub known_text: String,
    pub kind: UnitKind,
    pub introduced_at: SentenceId,
    normalized: NormalizedText,
}

impl Unit {
    pub(crate) fn new(
        id: UnitId,
        target_text: String,
        known_text: String,
        kind: UnitKind,
        introduced_at: SentenceId,
    ) -> Self {
        let normalized = normalize(&target_text);
        Self {
            id,
            target_text,
            known_text,
            kind,
            introduced_at,
            normalized,
        }
    }

    pub fn normalized(&self) -> &NormalizedText {
        &self.normalized
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, UnitKind::Composite(_))
    }

    pub fn to_record(&self) -> UnitRecord {
        UnitRecord {
            canonical_id: self.id,
            kind: self.kind.tag(),
            target_text: self.target_text.clone(),
            known_text: self.known_text.clone(),
            introducing_sentence_id: self.introduced_at,
            components: self.kind.components().map(|c| c.as_slice().to_vec()),
        }
    }
}

/// Flat export row for one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub canonical_id: UnitId,
    pub kind: UnitKindTag,
    pub target_text: String,
    pub known_text: String,
    pub introducing_sentence_id: SentenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
}

/// What a decomposition proposes for one position in a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitProposal {
    pub target_text: String,
    pub known_text: String,
    pub kind: UnitKind,
}

impl UnitProposal {
    pub fn atomic(target_text: impl Into<String>, known_text: impl Into<String>) -> Self {
        Self {
            target_text: target_text.into(),
            known_text: known_text.into(),
            kind: UnitKind::Atomic,
        }
    }

    pub fn composite(
        target_text: impl Into<String>,
        known_text: impl Into<String>,
        components: Components,
    ) -> Self {
        Self {
            target_text: target_text.into(),
            known_text: known_text.into(),
            kind: UnitKind::Composite(components),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    New,
    #[serde(alias = "ref")]
    Reference,
}

impl OccurrenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OccurrenceStatus::New => "new",
            OccurrenceStatus::Reference => "reference",
        }
    }
}

/// A unit used at one position of one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub canonical_id: UnitId,
    pub status: OccurrenceStatus,
}

/// Example sentence attached to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticePhrase {
    #[serde(alias = "known", alias = "knownText")]
    pub known_text: String,
    #[serde(alias = "target", alias = "targetText")]
    pub target_text: String,
    #[serde(default, alias = "lengthBucket", alias = "bucket")]
    pub length_bucket: String,
}

impl PracticePhrase {
    pub fn new(
        known_text: impl Into<String>,
        target_text: impl Into<String>,
        length_bucket: impl Into<String>,
    ) -> Self {
        Self {
            known_text: known_text.into(),
            target_text: target_text.into(),
            length_bucket: length_bucket.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_reject_empty_lists() {
        assert_eq!(Components::new(Vec::new()), Err(ComponentsError::Empty));
        let parsed: Result<Components, _> = serde_json::from_str("[]");
        assert!(parsed.is_err());
    }

    #[test]
    fn kind_from_parts_enforces_composite_components() {
        assert_eq!(
            UnitKind::from_parts(UnitKindTag::Composite, None),
            Err(UnitRecordError::CompositeWithoutComponents)
        );
        assert_eq!(
            UnitKind::from_parts(UnitKindTag::Atomic, Some(Vec::new())),
            Ok(UnitKind::Atomic)
        );
        assert_eq!(
            UnitKind::from_parts(UnitKindTag::Atomic, Some(vec![Component::new("a", "b")])),
            Err(UnitRecordError::AtomicWithComponents)
        );
    }

    #[test]
    fn kind_tag_accepts_legacy_letters() {
        let atomic: UnitKindTag = serde_json::from_str("\"A\"").unwrap();
        let composite: UnitKindTag = serde_json::from_str("\"M\"").unwrap();
        assert_eq!(atomic, UnitKindTag::Atomic);
        assert_eq!(composite, UnitKindTag::Composite);
    }

    #[test]
    fn sentence_accepts_seed_aliases() {
        let sentence: Sentence = serde_json::from_str(
            r#"{"seed_id":"S0001","known":"I want to speak.","target":"Quiero hablar."}"#,
        )
        .unwrap();
        assert_eq!(sentence.id, SentenceId(1));
        assert_eq!(sentence.target_text, "Quiero hablar.");
    }

    #[test]
    fn record_omits_components_for_atomic_units() {
        let unit = Unit::new(
            UnitId(1),
            "Quiero".to_string(),
            "I want".to_string(),
            UnitKind::Atomic,
            SentenceId(1),
        );
        let json = serde_json::to_string(&unit.to_record()).unwrap();
        assert_eq!(
            json,
            r#"{"canonical_id":1,"kind":"atomic","target_text":"Quiero","known_text":"I want","introducing_sentence_id":"S0001"}"#
        );
    }
}
