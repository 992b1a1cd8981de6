//! Curriculum identifiers.
//!
//! `SentenceId` is the curriculum backbone: its total order decides which
//! sentence owns a unit. `UnitId` is the dense, sequential canonical id handed
//! out by the registry.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Position of a sentence in the curriculum.
///
/// Rendered as `S` plus at least four zero-padded digits (`S0001`). Parsing
/// accepts `S0001`, `s1`, or a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SentenceId(pub u32);

impl SentenceId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Lower bound (exclusive) of a window of `width` sentences ending here.
    pub fn window_floor(self, width: u32) -> u32 {
        self.0.saturating_sub(width)
    }
}

impl fmt::Display for SentenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:04}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sentence id `{0}`: expected `S0001` or a bare number")]
pub struct SentenceIdError(pub String);

impl FromStr for SentenceId {
    type Err = SentenceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('S')
            .or_else(|| trimmed.strip_prefix('s'))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(SentenceIdError(s.to_string()));
        }
        digits
            .parse::<u32>()
            .map(SentenceId)
            .map_err(|_| SentenceIdError(s.to_string()))
    }
}

impl Serialize for SentenceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SentenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(SentenceId(n)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Canonical unit id. Dense, starting at 1, never reassigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn value(self) -> u32 {
        self.0
    }

    /// Zero-based slot in the registry's dense table.
    pub(crate) fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
