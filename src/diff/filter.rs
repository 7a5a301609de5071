//! Length and stop-word filtering of highlight candidates.

use std::collections::HashSet;

use super::options::CompareOptions;

/// Drops words and phrases too short or too generic to be worth a highlight.
#[derive(Debug, Clone)]
pub struct WordFilter {
    min_length: usize,
    stop_words: HashSet<String>,
}

impl WordFilter {
    pub fn new<I, S>(min_length: usize, stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            min_length,
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn from_options(options: &CompareOptions) -> Self {
        Self::new(options.min_word_length, &options.stop_words)
    }

    /// Whether `text` survives the filter.
    ///
    /// Length is counted in characters of the trimmed text; the stop-word test
    /// is case-insensitive and applies to the whole text.
    pub fn accepts(&self, text: &str) -> bool {
        let text = text.trim();
        text.chars().count() >= self.min_length && !self.is_stop_word(text)
    }

    pub fn is_stop_word(&self, text: &str) -> bool {
        self.stop_words.contains(&text.trim().to_lowercase())
    }
}

impl Default for WordFilter {
    fn default() -> Self {
        Self::from_options(&CompareOptions::default())
    }
}
