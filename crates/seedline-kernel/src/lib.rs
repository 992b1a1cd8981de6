//! # Seedline Kernel
//!
//! The identity and safety rules of a sentence-ordered curriculum.
//!
//! Sentences arrive in a fixed order. Each is decomposed into reusable
//! phrase units; a unit's identity is its normalized target text, and the
//! earliest sentence that uses a text owns it. Everything downstream
//! (practice phrases, recency windows) may only use what has already been
//! taught.
//!
//! ## Architecture
//!
//! ```text
//! normalize        ← NormalizedText, tokenize, meaning keys
//!     │
//! unit / ids       ← Sentence, Unit (Atomic | Composite), SentenceId, UnitId
//!     │
//! tiling           ← ordered occurrences rebuild their sentence exactly
//! collision        ← one meaning, one surface text
//!     │
//! registry         ← the single-writer canonical table
//!     │
//! frontier         ← what is available at a position, GATE checks
//!     │
//! witness          ← deterministic ids for every reported violation
//! ```
//!
//! This crate does no I/O beyond reading a config file. Batches, replay
//! and exports live in `seedline-ledger`.

pub mod collision;
pub mod config;
pub mod frontier;
pub mod ids;
pub mod normalize;
pub mod registry;
pub mod tiling;
pub mod unit;
pub mod witness;

pub use collision::{CollisionViolation, MeaningPair, check_collisions, check_curriculum};
pub use config::{ConfigError, CurriculumConfig, TilingMode};
pub use frontier::{BasketReport, FrontierIndex, GateViolation, PhraseValidation};
pub use ids::{SentenceId, SentenceIdError, UnitId};
pub use normalize::{NormalizedText, meaning_key, normalize, tokenize};
pub use registry::{CollisionFlag, Registration, Registry, RegistryConfig, RegistryError};
pub use tiling::{TilingResult, validate_components, validate_tiling};
pub use unit::{
    Component, Components, ComponentsError, Occurrence, OccurrenceStatus, PracticePhrase,
    Sentence, Unit, UnitKind, UnitKindTag, UnitProposal, UnitRecord,
};
pub use witness::{Severity, ViolationReport, Witness};
