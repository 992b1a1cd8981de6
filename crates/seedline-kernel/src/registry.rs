//! Canonical unit registry.
//!
//! A dense table of units keyed three ways: normalized target text → unit,
//! canonical id → unit, meaning → first unit that claimed it. All mutation
//! goes through [`Registry::register`] (and the narrow component backfill).
//! The registry itself is not synchronized; callers serialize writes by
//! replaying in sentence order and hand out clones as read-only snapshots.
//!
//! Identity belongs to the earliest source: re-registering known text
//! returns the existing unit untouched, whatever the caller proposes.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::config::{CurriculumConfig, TilingMode};
use crate::ids::{SentenceId, UnitId};
use crate::normalize::{NormalizedText, meaning_key, normalize};
use crate::tiling::validate_components;
use crate::unit::{Components, Unit, UnitKind, UnitProposal, UnitRecord, UnitRecordError};
use crate::witness::{Severity, Witness, failure_class};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub case_sensitive_meanings: bool,
    pub tiling: TilingMode,
}

impl From<&CurriculumConfig> for RegistryConfig {
    fn from(config: &CurriculumConfig) -> Self {
        Self {
            case_sensitive_meanings: config.collision.case_sensitive,
            tiling: config.tiling.mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("text normalizes to nothing at {sentence_id}: {text:?}")]
    EmptyText { sentence_id: SentenceId, text: String },

    #[error(
        "`{text}` is owned by {owner} (unit {unit_id}) but was registered earlier at {sentence_id}"
    )]
    OwnershipRegression {
        text: String,
        unit_id: UnitId,
        owner: SentenceId,
        sentence_id: SentenceId,
    },

    #[error("unknown unit: {0}")]
    UnknownUnit(UnitId),

    #[error("unit {0} already has components")]
    ComponentsAlreadySet(UnitId),

    #[error("components of `{text}` do not tile it (missing `{remainder}`, extra `{surplus}`)")]
    ComponentsDoNotTile {
        text: String,
        remainder: String,
        surplus: String,
    },

    #[error("snapshot lists unit {0} more than once")]
    DuplicateSnapshotId(UnitId),

    #[error("snapshot ids are not dense: expected unit {expected}, found {found}")]
    SparseSnapshotIds { expected: UnitId, found: UnitId },

    #[error("snapshot units {first} and {second} share the text `{text}`")]
    DuplicateSnapshotText {
        text: String,
        first: UnitId,
        second: UnitId,
    },

    #[error("snapshot unit {unit_id}: {source}")]
    InvalidSnapshotRecord {
        unit_id: UnitId,
        #[source]
        source: UnitRecordError,
    },
}

/// A genuinely new unit whose meaning was already claimed by another text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionFlag {
    pub unit_id: UnitId,
    pub sentence_id: SentenceId,
    pub known_text: String,
    pub target_text: String,
    pub existing_unit_id: UnitId,
    pub existing_target_text: String,
}

impl CollisionFlag {
    pub fn witness(&self) -> Witness {
        Witness::new(
            failure_class::COLLISION,
            format!("unit:{}", self.unit_id),
            format!(
                "{:?} at {} reuses the meaning {:?} already taught as {:?} (unit {})",
                self.target_text,
                self.sentence_id,
                self.known_text,
                self.existing_target_text,
                self.existing_unit_id
            ),
            Some(json!({
                "knownText": self.known_text,
                "existingUnitId": self.existing_unit_id,
            })),
            Severity::Warning,
        )
    }
}

/// Outcome of one `register` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub unit_id: UnitId,
    pub is_new: bool,
    pub collision: Option<CollisionFlag>,
}

#[derive(Debug, Clone)]
pub struct Registry {
    config: RegistryConfig,
    units: Vec<Unit>,
    by_text: BTreeMap<NormalizedText, UnitId>,
    by_meaning: BTreeMap<NormalizedText, UnitId>,
    collisions: Vec<CollisionFlag>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            units: Vec::new(),
            by_text: BTreeMap::new(),
            by_meaning: BTreeMap::new(),
            collisions: Vec::new(),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn lookup(&self, normalized: &NormalizedText) -> Option<&Unit> {
        self.by_text.get(normalized).and_then(|id| self.get(*id))
    }

    /// Normalize `text` and look it up.
    pub fn lookup_text(&self, text: &str) -> Option<&Unit> {
        self.lookup(&normalize(text))
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        if id.0 == 0 {
            return None;
        }
        self.units.get(id.index())
    }

    /// Units in canonical id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Units ordered by introducing sentence, ties by canonical id.
    pub fn all_entries(&self) -> Vec<&Unit> {
        let mut entries: Vec<&Unit> = self.units.iter().collect();
        entries.sort_by_key(|u| (u.introduced_at, u.id));
        entries
    }

    /// Meaning collisions flagged so far, in the order they were raised.
    pub fn collision_flags(&self) -> &[CollisionFlag] {
        &self.collisions
    }

    /// Export rows, ordered like [`Registry::all_entries`].
    pub fn to_records(&self) -> Vec<UnitRecord> {
        self.all_entries().into_iter().map(Unit::to_record).collect()
    }

    /// Resolve `proposal` at `sentence_id`: an existing unit if its text is
    /// already registered, otherwise a new unit with the next id.
    ///
    /// A new unit whose meaning already belongs to another text is still
    /// registered; the collision is returned and kept in
    /// [`Registry::collision_flags`].
    pub fn register(
        &mut self,
        sentence_id: SentenceId,
        proposal: UnitProposal,
    ) -> Result<Registration, RegistryError> {
        let normalized = normalize(&proposal.target_text);
        if normalized.is_empty() {
            return Err(RegistryError::EmptyText {
                sentence_id,
                text: proposal.target_text,
            });
        }

        if let Some(&unit_id) = self.by_text.get(&normalized) {
            let owner = self.units[unit_id.index()].introduced_at;
            if sentence_id < owner {
                return Err(RegistryError::OwnershipRegression {
                    text: normalized.into_string(),
                    unit_id,
                    owner,
                    sentence_id,
                });
            }
            return Ok(Registration {
                unit_id,
                is_new: false,
                collision: None,
            });
        }

        if let UnitKind::Composite(components) = &proposal.kind {
            self.check_components(&proposal.target_text, components)?;
        }

        let unit_id = UnitId(self.units.len() as u32 + 1);
        let unit = Unit::new(
            unit_id,
            proposal.target_text,
            proposal.known_text,
            proposal.kind,
            sentence_id,
        );
        let collision = self.index_meaning(&unit);
        self.by_text.insert(normalized, unit_id);
        self.units.push(unit);

        Ok(Registration {
            unit_id,
            is_new: true,
            collision,
        })
    }

    /// Attach a composite breakdown discovered after the unit was created.
    ///
    /// Only atomic units can be backfilled, and the components must tile the
    /// unit's text. Identity, meaning, and ownership never change.
    pub fn backfill_components(
        &mut self,
        unit_id: UnitId,
        components: Components,
    ) -> Result<(), RegistryError> {
        let unit = self.get(unit_id).ok_or(RegistryError::UnknownUnit(unit_id))?;
        if unit.is_composite() {
            return Err(RegistryError::ComponentsAlreadySet(unit_id));
        }
        let text = unit.target_text.clone();
        self.check_components(&text, &components)?;
        self.units[unit_id.index()].kind = UnitKind::Composite(components);
        Ok(())
    }

    /// Rebuild a registry from exported rows.
    ///
    /// Ids must be exactly `1..=n`; texts must be unique after
    /// normalization. Meaning collisions are recomputed in introduction
    /// order.
    pub fn from_snapshot(
        mut records: Vec<UnitRecord>,
        config: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        records.sort_by_key(|r| r.canonical_id);
        let mut registry = Self::new(config);

        let mut previous: Option<UnitId> = None;
        for (index, record) in records.into_iter().enumerate() {
            if previous == Some(record.canonical_id) {
                return Err(RegistryError::DuplicateSnapshotId(record.canonical_id));
            }
            let expected = UnitId(index as u32 + 1);
            if record.canonical_id != expected {
                return Err(RegistryError::SparseSnapshotIds {
                    expected,
                    found: record.canonical_id,
                });
            }
            previous = Some(record.canonical_id);

            let kind = UnitKind::from_parts(record.kind, record.components).map_err(|source| {
                RegistryError::InvalidSnapshotRecord {
                    unit_id: record.canonical_id,
                    source,
                }
            })?;
            let unit = Unit::new(
                record.canonical_id,
                record.target_text,
                record.known_text,
                kind,
                record.introducing_sentence_id,
            );
            if unit.normalized().is_empty() {
                return Err(RegistryError::EmptyText {
                    sentence_id: unit.introduced_at,
                    text: unit.target_text,
                });
            }
            if let Some(&first) = registry.by_text.get(unit.normalized()) {
                return Err(RegistryError::DuplicateSnapshotText {
                    text: unit.normalized().to_string(),
                    first,
                    second: unit.id,
                });
            }
            registry.by_text.insert(unit.normalized().clone(), unit.id);
            registry.units.push(unit);
        }

        let order: Vec<UnitId> = registry.all_entries().iter().map(|u| u.id).collect();
        for unit_id in order {
            let unit = registry.units[unit_id.index()].clone();
            registry.index_meaning(&unit);
        }

        Ok(registry)
    }

    fn check_components(&self, text: &str, components: &Components) -> Result<(), RegistryError> {
        let tiling = validate_components(text, components, self.config.tiling);
        if tiling.ok {
            return Ok(());
        }
        Err(RegistryError::ComponentsDoNotTile {
            text: text.to_string(),
            remainder: tiling.remainder,
            surplus: tiling.surplus,
        })
    }

    fn index_meaning(&mut self, unit: &Unit) -> Option<CollisionFlag> {
        let key = meaning_key(&unit.known_text, self.config.case_sensitive_meanings);
        if key.is_empty() {
            return None;
        }

        let existing_id = match self.by_meaning.get(&key) {
            None => {
                self.by_meaning.insert(key, unit.id);
                return None;
            }
            Some(&id) => id,
        };
        let existing = &self.units[existing_id.index()];
        if existing.normalized() == unit.normalized() {
            return None;
        }

        let flag = CollisionFlag {
            unit_id: unit.id,
            sentence_id: unit.introduced_at,
            known_text: unit.known_text.clone(),
            target_text: unit.target_text.clone(),
            existing_unit_id: existing.id,
            existing_target_text: existing.target_text.clone(),
        };
        tracing::warn!(
            unit_id = %flag.unit_id,
            sentence_id = %flag.sentence_id,
            known_text = %flag.known_text,
            existing_unit_id = %flag.existing_unit_id,
            "meaning already maps to another unit; registered and flagged"
        );
        self.collisions.push(flag.clone());
        Some(flag)
    }
}
