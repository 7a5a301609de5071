//! Word normalization for comparison.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Normalization switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Fold case before comparing
    pub case_insensitive: bool,
    /// Treat typographic quote variants as their ASCII counterparts
    pub ignore_quote_variants: bool,
    /// Compose to Unicode NFC first
    pub unicode_nfc: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            ignore_quote_variants: true,
            unicode_nfc: true,
        }
    }
}

/// Canonicalizes words for comparison.
///
/// The result is only ever compared; display always uses the original text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> NormalizeOptions {
        self.options
    }

    /// Normalize a single word or a phrase.
    pub fn normalize(&self, text: &str) -> String {
        let composed: String = if self.options.unicode_nfc {
            text.nfc().collect()
        } else {
            text.to_string()
        };

        let folded = if self.options.case_insensitive {
            composed.to_lowercase()
        } else {
            composed
        };

        if self.options.ignore_quote_variants {
            folded.chars().map(unify_quote).collect()
        } else {
            folded
        }
    }

    /// Normalize each whitespace-separated word and join them with single spaces.
    pub fn normalize_phrase(&self, phrase: &str) -> String {
        phrase
            .split_whitespace()
            .map(|w| self.normalize(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn unify_quote(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{02BC}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
        | '\u{00BB}' => '"',
        _ => c,
    }
}
