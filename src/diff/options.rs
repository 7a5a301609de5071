//! Comparison options and configuration.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::normalize::NormalizeOptions;
use crate::error::{Error, Result};

/// Words that never produce a highlight on their own.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "de",
    "ml",
    "gr",
    "pot",
    "cartouche",
    "la",
    "le",
    "les",
    "et",
    "en",
    "à",
    "du",
    "des",
    "un",
    "une",
];

/// Options for comparing two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Where the differences come from
    pub mode: CompareMode,

    /// Unit of word alignment
    pub scope: AlignmentScope,

    /// How move counters are consumed
    pub move_policy: MovePolicy,

    /// Word normalization
    pub normalize: NormalizeOptions,

    /// Minimum length of a highlighted word or phrase, in characters
    pub min_word_length: usize,

    /// Words that are never highlighted or reported missing
    pub stop_words: Vec<String>,

    /// Vertical merge tolerance in page units
    pub y_tolerance: f32,

    /// Horizontal merge tolerance in page units
    pub x_tolerance: f32,

    /// Highlight cap per phrase when locating vision results
    pub max_highlights_per_word: usize,

    /// Derive an old → new mapping from replace opcodes
    pub derive_changes: bool,

    /// Add a note listing deleted items to each annotated document
    pub missing_note: bool,

    /// Highlight opacity (0.0 - 1.0)
    pub highlight_opacity: f32,

    /// Whether to use parallel processing
    pub parallel: bool,

    /// Page selection (which pages to compare, 1-indexed)
    pub pages: PageSelection,
}

impl CompareOptions {
    /// Create new compare options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the comparison mode.
    pub fn with_mode(mut self, mode: CompareMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the alignment scope.
    pub fn with_scope(mut self, scope: AlignmentScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the move policy.
    pub fn with_move_policy(mut self, policy: MovePolicy) -> Self {
        self.move_policy = policy;
        self
    }

    /// Set normalization options.
    pub fn with_normalize(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set the minimum word length.
    pub fn with_min_word_length(mut self, len: usize) -> Self {
        self.min_word_length = len;
        self
    }

    /// Replace the stop-word list.
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    /// Set both merge tolerances.
    pub fn with_tolerance(mut self, x: f32, y: f32) -> Self {
        self.x_tolerance = x;
        self.y_tolerance = y;
        self
    }

    /// Set the per-phrase highlight cap.
    pub fn with_max_highlights_per_word(mut self, max: usize) -> Self {
        self.max_highlights_per_word = max;
        self
    }

    /// Enable or disable derived change mappings.
    pub fn with_derived_changes(mut self, derive: bool) -> Self {
        self.derive_changes = derive;
        self
    }

    /// Enable or disable the missing-words note.
    pub fn with_missing_note(mut self, note: bool) -> Self {
        self.missing_note = note;
        self
    }

    /// Set the highlight opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.highlight_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Load options from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: CompareOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values no comparison can run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.x_tolerance >= 0.0 && self.y_tolerance >= 0.0) {
            return Err(Error::Config(format!(
                "merge tolerances must be non-negative (x = {}, y = {})",
                self.x_tolerance, self.y_tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.highlight_opacity) {
            return Err(Error::Config(format!(
                "highlight opacity must be within 0.0..=1.0, got {}",
                self.highlight_opacity
            )));
        }
        if self.max_highlights_per_word == 0 {
            return Err(Error::Config(
                "max_highlights_per_word must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            mode: CompareMode::Alignment,
            scope: AlignmentScope::Page,
            move_policy: MovePolicy::Presence,
            normalize: NormalizeOptions::default(),
            min_word_length: 3,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            y_tolerance: 10.0,
            x_tolerance: 10.0,
            max_highlights_per_word: 3,
            derive_changes: true,
            missing_note: true,
            highlight_opacity: 0.3,
            parallel: true,
            pages: PageSelection::All,
        }
    }
}

/// Source of the differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Word alignment of the extracted tokens
    #[default]
    Alignment,
    /// Differences reported by a vision diff service
    Vision,
}

/// Unit over which sequences are aligned and words counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentScope {
    /// Page i of one document against page i of the other
    #[default]
    Page,
    /// The whole document at once
    Document,
}

/// How move counters behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePolicy {
    /// A word is moved whenever its text occurs anywhere in the other side
    #[default]
    Presence,
    /// Each counterpart instance can justify only one move
    Consume,
}

/// Page selection for comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PageSelection {
    /// Compare all pages
    #[default]
    All,
    /// Compare a range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Compare specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Check a zero-based page index.
    pub fn includes_index(&self, index: u32) -> bool {
        self.includes(index + 1)
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let invalid = || Error::InvalidPageRange(s.to_string());

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                if start == 0 || end < start {
                    return Err(invalid());
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                if start == 0 || end < start {
                    return Err(invalid());
                }
                for p in start..=end {
                    if !pages.contains(&p) {
                        pages.push(p);
                    }
                }
            } else {
                let p: u32 = part.parse().map_err(|_| invalid())?;
                if p == 0 {
                    return Err(invalid());
                }
                if !pages.contains(&p) {
                    pages.push(p);
                }
            }
        }

        pages.sort();
        Ok(PageSelection::Pages(pages))
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelection::All => write!(f, "all"),
            PageSelection::Range(range) => write!(f, "{}-{}", range.start(), range.end()),
            PageSelection::Pages(pages) => {
                let parts: Vec<String> = pages.iter().map(u32::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl TryFrom<String> for PageSelection {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        PageSelection::parse(&value)
    }
}

impl From<PageSelection> for String {
    fn from(selection: PageSelection) -> Self {
        selection.to_string()
    }
}
