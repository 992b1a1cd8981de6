//! Tiling: an ordered decomposition must rebuild its sentence exactly.
//!
//! Occurrence texts are joined in the given order, normalized, and compared
//! with the normalized sentence. The check is structural only; it never
//! repairs a decomposition. On mismatch the result carries the unmatched
//! tail of both sides so the caller can see where coverage broke.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::TilingMode;
use crate::normalize::normalize;
use crate::unit::{Components, Sentence};
use crate::witness::{Severity, Witness, failure_class};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilingResult {
    pub ok: bool,
    /// Normalized sentence text.
    pub expected: String,
    /// Normalized concatenation of the occurrences.
    pub reconstructed: String,
    /// Part of `expected` not covered after the longest common prefix.
    pub remainder: String,
    /// Part of `reconstructed` beyond the longest common prefix.
    pub surplus: String,
}

impl TilingResult {
    /// The mismatch as a witness against `subject`, or `None` when tiled.
    pub fn witness(&self, subject: impl Into<String>) -> Option<Witness> {
        if self.ok {
            return None;
        }
        let message = format!(
            "decomposition does not tile: expected {:?}, reconstructed {:?}",
            self.expected, self.reconstructed
        );
        Some(Witness::new(
            failure_class::TILING_MISMATCH,
            subject,
            message,
            Some(json!({ "remainder": self.remainder, "surplus": self.surplus })),
            Severity::Error,
        ))
    }
}

/// Check that `parts`, in order, tile `sentence`.
pub fn validate_tiling<I, S>(sentence: &Sentence, parts: I, mode: TilingMode) -> TilingResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    validate_text_tiling(&sentence.target_text, parts, mode)
}

/// Check that a composite's components tile the composite text.
pub fn validate_components(
    unit_text: &str,
    components: &Components,
    mode: TilingMode,
) -> TilingResult {
    validate_text_tiling(
        unit_text,
        components.iter().map(|c| c.target_text.as_str()),
        mode,
    )
}

pub fn validate_text_tiling<I, S>(text: &str, parts: I, mode: TilingMode) -> TilingResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<S> = parts.into_iter().collect();
    let joiner = match mode {
        TilingMode::Spaced => " ",
        TilingMode::Unspaced => "",
    };
    let joined = parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(joiner);

    let (expected, reconstructed) = match mode {
        TilingMode::Spaced => (
            normalize(text).into_string(),
            normalize(&joined).into_string(),
        ),
        TilingMode::Unspaced => (normalize(text).compact(), normalize(&joined).compact()),
    };

    if expected == reconstructed {
        return TilingResult {
            ok: true,
            expected,
            reconstructed,
            remainder: String::new(),
            surplus: String::new(),
        };
    }

    let (remainder, surplus) = match mode {
        TilingMode::Spaced => token_tails(&expected, &reconstructed),
        TilingMode::Unspaced => char_tails(&expected, &reconstructed),
    };
    TilingResult {
        ok: false,
        expected,
        reconstructed,
        remainder,
        surplus,
    }
}

fn token_tails(expected: &str, reconstructed: &str) -> (String, String) {
    let left: Vec<&str> = expected.split(' ').filter(|t| !t.is_empty()).collect();
    let right: Vec<&str> = reconstructed.split(' ').filter(|t| !t.is_empty()).collect();
    let common = left
        .iter()
        .zip(right.iter())
        .take_while(|(a, b)| a == b)
        .count();
    (left[common..].join(" "), right[common..].join(" "))
}

fn char_tails(expected: &str, reconstructed: &str) -> (String, String) {
    let common: usize = expected
        .chars()
        .zip(reconstructed.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    (
        expected[common..].to_string(),
        reconstructed[common..].to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SentenceId;
    use crate::unit::Component;

    fn sentence(target: &str) -> Sentence {
        Sentence::new(SentenceId(1), "", target)
    }

    #[test]
    fn exact_cover_is_ok() {
        let result = validate_tiling(
            &sentence("Quiero hablar."),
            ["Quiero", "hablar"],
            TilingMode::Spaced,
        );
        assert!(result.ok);
        assert_eq!(result.reconstructed, "quiero hablar");
        assert!(result.remainder.is_empty());
    }

    #[test]
    fn gap_reports_uncovered_tail() {
        let result = validate_tiling(
            &sentence("Quiero hablar español."),
            ["Quiero", "hablar"],
            TilingMode::Spaced,
        );
        assert!(!result.ok);
        assert_eq!(result.remainder, "español");
        assert_eq!(result.surplus, "");

        let witness = result.witness("sentence:S0001").unwrap();
        assert_eq!(witness.class, "tiling_mismatch");
        assert_eq!(witness.context.unwrap()["remainder"], "español");
    }

    #[test]
    fn overlap_reports_surplus() {
        let result = validate_tiling(
            &sentence("Quiero hablar."),
            ["Quiero hablar", "hablar"],
            TilingMode::Spaced,
        );
        assert!(!result.ok);
        assert_eq!(result.remainder, "");
        assert_eq!(result.surplus, "hablar");
    }

    #[test]
    fn order_matters() {
        let result = validate_tiling(
            &sentence("Quiero hablar."),
            ["hablar", "Quiero"],
            TilingMode::Spaced,
        );
        assert!(!result.ok);
        assert_eq!(result.remainder, "quiero hablar");
        assert_eq!(result.surplus, "hablar quiero");
    }

    #[test]
    fn empty_sentence_with_empty_decomposition_tiles() {
        let result = validate_tiling(&sentence(""), Vec::<&str>::new(), TilingMode::Spaced);
        assert!(result.ok);
    }

    #[test]
    fn unspaced_mode_ignores_word_spacing() {
        let result = validate_tiling(&sentence("我想说。"), ["我", "想说"], TilingMode::Unspaced);
        assert!(result.ok);

        let spaced = validate_tiling(&sentence("我想说。"), ["我", "想说"], TilingMode::Spaced);
        assert!(!spaced.ok);
    }

    #[test]
    fn unspaced_mismatch_reports_char_tails() {
        let result = validate_tiling(&sentence("我想说"), ["我", "想"], TilingMode::Unspaced);
        assert!(!result.ok);
        assert_eq!(result.remainder, "说");
        assert_eq!(result.surplus, "");
    }

    #[test]
    fn components_must_tile_their_composite() {
        let components = Components::new(vec![
            Component::new("me", "me"),
            Component::new("gustaría", "would like"),
        ])
        .unwrap();
        assert!(validate_components("Me gustaría", &components, TilingMode::Spaced).ok);
        assert!(!validate_components("Me gustaría ir", &components, TilingMode::Spaced).ok);
    }
}
