//! Availability frontier and the GATE check for practice phrases.
//!
//! The index records, for every token, the earliest sentence whose unit
//! (target text or composite component) teaches it. The frontier at `P` is
//! then every token first taught at or before `P`, so `frontier(P)` is a
//! subset of `frontier(P + 1)` by construction.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{SentenceId, UnitId};
use crate::normalize::{normalize, tokenize};
use crate::registry::Registry;
use crate::unit::{PracticePhrase, Unit};
use crate::witness::{Severity, Witness, failure_class};

#[derive(Debug, Clone, Default)]
pub struct FrontierIndex {
    first_taught: BTreeMap<String, SentenceId>,
    /// (introducing sentence, unit, tokens), sorted by sentence then unit.
    taught: Vec<(SentenceId, UnitId, Vec<String>)>,
}

/// A token a phrase uses before the curriculum teaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateViolation {
    pub token: String,
    /// Sentence that first teaches the token, if any does.
    pub introduced_at: Option<SentenceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseValidation {
    pub ok: bool,
    pub position: SentenceId,
    pub target_text: String,
    pub violating_tokens: Vec<GateViolation>,
}

impl PhraseValidation {
    pub fn violating_token_texts(&self) -> Vec<&str> {
        self.violating_tokens
            .iter()
            .map(|v| v.token.as_str())
            .collect()
    }

    /// One witness per violating token, against `subject`.
    pub fn witnesses(&self, subject: &str) -> Vec<Witness> {
        self.violating_tokens
            .iter()
            .map(|v| {
                let message = match v.introduced_at {
                    Some(at) => format!(
                        "{:?} is used at {} but first taught at {at}",
                        v.token, self.position
                    ),
                    None => format!("{:?} is never taught", v.token),
                };
                Witness::new(
                    failure_class::GATE_VIOLATION,
                    subject,
                    message,
                    Some(json!({ "token": v.token, "position": self.position })),
                    Severity::Error,
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketReport {
    pub unit_id: UnitId,
    pub unit_text: String,
    pub position: SentenceId,
    pub results: Vec<PhraseValidation>,
    /// At least one phrase contains the unit's own text.
    pub practices_own_unit: bool,
    pub bucket_counts: BTreeMap<String, usize>,
}

impl BasketReport {
    /// The basket as a whole is usable when it practices its own unit.
    /// Individual phrases are gated separately by their own result.
    pub fn is_publishable(&self) -> bool {
        self.practices_own_unit
    }

    pub fn all_ok(&self) -> bool {
        self.practices_own_unit && self.results.iter().all(|r| r.ok)
    }

    /// GATE witnesses per phrase, plus one against the unit when no phrase
    /// practices it.
    pub fn witnesses(&self) -> Vec<Witness> {
        let mut witnesses: Vec<Witness> = self
            .results
            .iter()
            .enumerate()
            .flat_map(|(i, r)| r.witnesses(&format!("unit:{}/phrase:{i}", self.unit_id)))
            .collect();
        if !self.practices_own_unit {
            witnesses.push(Witness::new(
                failure_class::BASKET_MISSING_OWN_UNIT,
                format!("unit:{}", self.unit_id),
                format!(
                    "no phrase in the basket for {:?} contains the unit itself",
                    self.unit_text
                ),
                Some(json!({ "position": self.position, "phrases": self.results.len() })),
                Severity::Error,
            ));
        }
        witnesses
    }

    /// Indices of phrases that pass the GATE check.
    pub fn publishable_phrases(&self) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.ok)
            .map(|(i, _)| i)
            .collect()
    }
}

fn unit_tokens(unit: &Unit) -> Vec<String> {
    let mut tokens = tokenize(&unit.target_text);
    if let Some(components) = unit.kind.components() {
        for component in components.iter() {
            tokens.extend(tokenize(&component.target_text));
        }
    }
    tokens.sort();
    tokens.dedup();
    tokens
}

impl FrontierIndex {
    pub fn build(registry: &Registry) -> Self {
        let mut index = Self::default();
        for unit in registry.all_entries() {
            let tokens = unit_tokens(unit);
            for token in &tokens {
                index
                    .first_taught
                    .entry(token.clone())
                    .and_modify(|at| *at = (*at).min(unit.introduced_at))
                    .or_insert(unit.introduced_at);
            }
            index.taught.push((unit.introduced_at, unit.id, tokens));
        }
        index
    }

    /// Sentence that first teaches `token`, if any.
    pub fn introduced_at(&self, token: &str) -> Option<SentenceId> {
        self.first_taught.get(token).copied()
    }

    /// Every token available at `position`.
    pub fn frontier(&self, position: SentenceId) -> BTreeSet<String> {
        self.first_taught
            .iter()
            .filter(|(_, at)| **at <= position)
            .map(|(token, _)| token.clone())
            .collect()
    }

    pub fn contains(&self, token: &str, position: SentenceId) -> bool {
        self.introduced_at(token).is_some_and(|at| at <= position)
    }

    /// Tokens of units introduced in `(position - window, position]`.
    ///
    /// For biasing generation toward recent material only; nothing is ever
    /// rejected for falling outside this set.
    pub fn recent_frontier(&self, position: SentenceId, window: u32) -> BTreeSet<String> {
        let floor = position.window_floor(window);
        let start = self.taught.partition_point(|(at, _, _)| at.0 <= floor);
        let end = self.taught.partition_point(|(at, _, _)| *at <= position);
        self.taught[start..end.max(start)]
            .iter()
            .flat_map(|(_, _, tokens)| tokens.iter().cloned())
            .collect()
    }

    /// GATE check for one phrase at `position`. An empty phrase passes.
    pub fn validate_phrase(&self, phrase: &PracticePhrase, position: SentenceId) -> PhraseValidation {
        let mut seen = BTreeSet::new();
        let mut violating_tokens = Vec::new();
        for token in tokenize(&phrase.target_text) {
            if self.contains(&token, position) || !seen.insert(token.clone()) {
                continue;
            }
            violating_tokens.push(GateViolation {
                introduced_at: self.introduced_at(&token),
                token,
            });
        }
        PhraseValidation {
            ok: violating_tokens.is_empty(),
            position,
            target_text: phrase.target_text.clone(),
            violating_tokens,
        }
    }

    /// GATE-check every phrase at the unit's own position, and confirm the
    /// basket practices the unit at all.
    pub fn validate_basket(&self, unit: &Unit, phrases: &[PracticePhrase]) -> BasketReport {
        let position = unit.introduced_at;
        let own = unit.normalized().as_str();
        let results = phrases
            .iter()
            .map(|p| self.validate_phrase(p, position))
            .collect();
        let practices_own_unit = phrases
            .iter()
            .any(|p| normalize(&p.target_text).as_str().contains(own));
        let mut bucket_counts = BTreeMap::new();
        for phrase in phrases {
            *bucket_counts.entry(phrase.length_bucket.clone()).or_insert(0) += 1;
        }
        BasketReport {
            unit_id: unit.id,
            unit_text: unit.target_text.clone(),
            position,
            results,
            practices_own_unit,
            bucket_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TilingMode;
    use crate::registry::RegistryConfig;
    use crate::unit::{Component, Components, UnitProposal};
    use crate::witness::ViolationReport;

    fn curriculum() -> Registry {
        let mut reg = Registry::new(RegistryConfig {
            case_sensitive_meanings: false,
            tiling: TilingMode::Spaced,
        });
        reg.register(SentenceId(1), UnitProposal::atomic("Quiero", "I want"))
            .unwrap();
        reg.register(SentenceId(1), UnitProposal::atomic("hablar", "to speak"))
            .unwrap();
        reg.register(SentenceId(2), UnitProposal::atomic("comer", "to eat"))
            .unwrap();
        let components = Components::new(vec![
            Component::new("me", "to me"),
            Component::new("gustaría", "it would please"),
        ])
        .unwrap();
        reg.register(
            SentenceId(5),
            UnitProposal::composite("me gustaría", "I would like", components),
        )
        .unwrap();
        reg
    }

    #[test]
    fn frontier_grows_with_position() {
        let index = FrontierIndex::build(&curriculum());
        let at1 = index.frontier(SentenceId(1));
        let at2 = index.frontier(SentenceId(2));
        let at5 = index.frontier(SentenceId(5));
        assert_eq!(at1, BTreeSet::from(["hablar".into(), "quiero".into()]));
        assert!(at1.is_subset(&at2));
        assert!(at2.is_subset(&at5));
        assert!(at5.contains("gustaría"));
        assert!(index.frontier(SentenceId(0)).is_empty());
    }

    #[test]
    fn recent_frontier_is_a_window() {
        let index = FrontierIndex::build(&curriculum());
        let recent = index.recent_frontier(SentenceId(5), 3);
        assert_eq!(recent, BTreeSet::from(["gustaría".into(), "me".into()]));
        let wide = index.recent_frontier(SentenceId(5), 10);
        assert_eq!(wide, index.frontier(SentenceId(5)));
    }

    #[test]
    fn phrase_with_later_token_fails_naming_it() {
        let index = FrontierIndex::build(&curriculum());
        let phrase = PracticePhrase::new("I want to eat", "Quiero comer", "short");
        let result = index.validate_phrase(&phrase, SentenceId(1));
        assert!(!result.ok);
        assert_eq!(
            result.violating_tokens,
            vec![GateViolation {
                token: "comer".into(),
                introduced_at: Some(SentenceId(2)),
            }]
        );

        let never = PracticePhrase::new("I want to sleep", "Quiero dormir dormir", "short");
        let result = index.validate_phrase(&never, SentenceId(5));
        assert_eq!(result.violating_token_texts(), vec!["dormir"]);
        assert_eq!(result.violating_tokens[0].introduced_at, None);
    }

    #[test]
    fn empty_phrase_is_vacuously_valid() {
        let index = FrontierIndex::build(&curriculum());
        let phrase = PracticePhrase::new("", "", "");
        assert!(index.validate_phrase(&phrase, SentenceId(1)).ok);
    }

    #[test]
    fn basket_must_practice_its_own_unit() {
        let reg = curriculum();
        let index = FrontierIndex::build(&reg);
        let unit = reg.lookup_text("comer").unwrap();

        let without = vec![PracticePhrase::new("I want to speak", "Quiero hablar", "short")];
        let report = index.validate_basket(unit, &without);
        assert!(report.results[0].ok);
        assert!(!report.practices_own_unit);
        assert!(!report.is_publishable());
        let rejected = ViolationReport::from_witnesses(report.witnesses());
        assert!(!rejected.is_accepted());
        assert_eq!(rejected.failure_classes, vec!["basket_missing_own_unit"]);
        assert_eq!(rejected.violations[0].subject, "unit:3");

        let with = vec![
            PracticePhrase::new("to eat", "comer", "short"),
            PracticePhrase::new("I would like to eat", "me gustaría comer", "medium"),
        ];
        let report = index.validate_basket(unit, &with);
        assert!(report.practices_own_unit);
        assert!(report.results[0].ok);
        assert!(!report.results[1].ok);
        assert_eq!(report.publishable_phrases(), vec![0]);
        assert_eq!(report.bucket_counts.get("medium"), Some(&1));
        assert!(!report.all_ok());

        let witnesses = report.witnesses();
        assert_eq!(witnesses.len(), 2);
        assert!(witnesses.iter().all(|w| w.subject == "unit:3/phrase:1"));
    }

    #[test]
    fn empty_basket_does_not_practice_its_unit() {
        let reg = curriculum();
        let index = FrontierIndex::build(&reg);
        let unit = reg.lookup_text("hablar").unwrap();
        let report = index.validate_basket(unit, &[]);
        assert!(!report.all_ok());
        let witnesses = report.witnesses();
        assert_eq!(witnesses.len(), 1);
        assert_eq!(witnesses[0].class, "basket_missing_own_unit");
        assert_eq!(witnesses[0].severity, Severity::Error);
    }
}
