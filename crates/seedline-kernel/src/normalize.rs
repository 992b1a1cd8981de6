//! Canonical text form used for identity, tiling, and tokenization.
//!
//! Normalization lower-cases, turns every character of a fixed
//! punctuation/quote/bracket set into whitespace, and collapses whitespace
//! runs to a single space. It is total, pure, and idempotent:
//! `normalize(normalize(x)) == normalize(x)` for every string.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Characters removed by normalization. Intra-word hyphens are kept.
pub const STRIPPED_CHARS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '<', '>', '¡', '¿',
    '«', '»', '‹', '›', '“', '”', '„', '‘', '’', '‚', '…', '–', '—', '。', '、', '，', '！',
    '？', '「', '」', '『', '』',
];

/// Text in canonical form. Only the normalizer can build one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tokens of this text, in order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|t| !t.is_empty())
    }

    /// The text with every space removed, for scripts without word spacing.
    pub fn compact(&self) -> String {
        self.0.chars().filter(|c| *c != ' ').collect()
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Knobs for the normalizer. Punctuation stripping and whitespace collapse
/// always apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub fold_case: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { fold_case: true }
    }
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex must compile"))
}

/// Canonical form: lower-cased, punctuation stripped, whitespace collapsed.
pub fn normalize(text: &str) -> NormalizedText {
    normalize_with(text, NormalizeOptions::default())
}

pub fn normalize_with(text: &str, options: NormalizeOptions) -> NormalizedText {
    let mut stripped = String::with_capacity(text.len());
    for ch in text.chars() {
        if STRIPPED_CHARS.contains(&ch) {
            stripped.push(' ');
        } else if options.fold_case {
            stripped.extend(ch.to_lowercase());
        } else {
            stripped.push(ch);
        }
    }
    let collapsed = whitespace_re().replace_all(&stripped, " ");
    NormalizedText(collapsed.trim().to_string())
}

/// Ordered word sequence of the normalized text.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text).tokens().map(str::to_string).collect()
}

/// Key under which a known-language meaning is compared for collisions.
///
/// Case-sensitive keys keep letter case but still ignore punctuation and
/// spacing differences.
pub fn meaning_key(text: &str, case_sensitive: bool) -> NormalizedText {
    normalize_with(
        text,
        NormalizeOptions {
            fold_case: !case_sensitive,
        },
    )
}
