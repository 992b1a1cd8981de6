//! Meaning collisions: one known-language meaning must map to exactly one
//! target-language surface text, curriculum-wide.
//!
//! Pure. Callers decide whether a collision blocks anything; the registry
//! only flags them.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::normalize::{meaning_key, normalize};
use crate::unit::{Sentence, Unit};
use crate::witness::{Severity, Witness, failure_class};

/// A (meaning, surface text) pair and where it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeaningPair {
    pub known_text: String,
    pub target_text: String,
    pub location: String,
}

impl MeaningPair {
    pub fn new(
        known_text: impl Into<String>,
        target_text: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            known_text: known_text.into(),
            target_text: target_text.into(),
            location: location.into(),
        }
    }
}

/// One meaning reached from more than one distinct surface text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionViolation {
    /// The meaning, in its comparison key form.
    pub known_text: String,
    /// Distinct normalized target texts, sorted.
    pub conflicting_target_texts: Vec<String>,
    /// Every location that used this meaning, sorted.
    pub locations: Vec<String>,
}

impl CollisionViolation {
    pub fn witness(&self) -> Witness {
        Witness::new(
            failure_class::COLLISION,
            format!("meaning:{}", self.known_text),
            format!(
                "meaning {:?} maps to {} target texts",
                self.known_text,
                self.conflicting_target_texts.len()
            ),
            Some(json!({
                "targetTexts": self.conflicting_target_texts,
                "locations": self.locations,
            })),
            Severity::Warning,
        )
    }
}

/// Group pairs by meaning and report every meaning with more than one target.
///
/// Pairs with an empty meaning key carry no meaning to collide on and are
/// skipped.
pub fn check_collisions(pairs: &[MeaningPair], case_sensitive: bool) -> Vec<CollisionViolation> {
    let mut by_meaning: BTreeMap<String, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
    for pair in pairs {
        let key = meaning_key(&pair.known_text, case_sensitive);
        if key.is_empty() {
            continue;
        }
        let entry = by_meaning.entry(key.into_string()).or_default();
        entry.0.insert(normalize(&pair.target_text).into_string());
        entry.1.insert(pair.location.clone());
    }

    by_meaning
        .into_iter()
        .filter(|(_, (targets, _))| targets.len() > 1)
        .map(|(known_text, (targets, locations))| {
            let mut locations: Vec<String> = locations.into_iter().collect();
            locations.sort_by(|a, b| location_key(a).cmp(&location_key(b)));
            CollisionViolation {
                known_text,
                conflicting_target_texts: targets.into_iter().collect(),
                locations,
            }
        })
        .collect()
}

/// Kind first, then the numeric id, so `unit:2` sorts before `unit:10`.
fn location_key(location: &str) -> (&str, Option<u64>, &str) {
    let (kind, id) = location.split_once(':').unwrap_or((location, ""));
    let digits = id.trim_start_matches(|c: char| !c.is_ascii_digit());
    (kind, digits.parse().ok(), location)
}

pub fn sentence_location(sentence: &Sentence) -> String {
    format!("sentence:{}", sentence.id)
}

pub fn unit_location(unit: &Unit) -> String {
    format!("unit:{}", unit.id)
}

pub fn sentence_pairs<'a>(sentences: impl IntoIterator<Item = &'a Sentence>) -> Vec<MeaningPair> {
    sentences
        .into_iter()
        .map(|s| MeaningPair::new(&s.known_text, &s.target_text, sentence_location(s)))
        .collect()
}

pub fn unit_pairs<'a>(units: impl IntoIterator<Item = &'a Unit>) -> Vec<MeaningPair> {
    units
        .into_iter()
        .map(|u| MeaningPair::new(&u.known_text, &u.target_text, unit_location(u)))
        .collect()
}

/// Sentence-level and unit-level collisions checked as one population.
pub fn check_curriculum<'a>(
    sentences: impl IntoIterator<Item = &'a Sentence>,
    units: impl IntoIterator<Item = &'a Unit>,
    case_sensitive: bool,
) -> Vec<CollisionViolation> {
    let mut pairs = sentence_pairs(sentences);
    pairs.extend(unit_pairs(units));
    check_collisions(&pairs, case_sensitive)
}
