//! Word tokens and the per-document token arena.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{BBox, Classification};
use crate::diff::Normalizer;

/// Which side of the comparison a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocId {
    /// The reference (original) document.
    A,
    /// The revised document.
    B,
}

impl DocId {
    /// The opposite document.
    pub fn other(self) -> DocId {
        match self {
            DocId::A => DocId::B,
            DocId::B => DocId::A,
        }
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocId::A => write!(f, "A"),
            DocId::B => write!(f, "B"),
        }
    }
}

/// One half of a dual comparison: which document is compared against which.
///
/// The target of a direction is the document that receives its highlights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Source A, target B
    AToB,
    /// Source B, target A
    BToA,
}

impl Direction {
    /// Both directions, in execution order.
    pub const BOTH: [Direction; 2] = [Direction::AToB, Direction::BToA];

    pub fn source(self) -> DocId {
        match self {
            Direction::AToB => DocId::A,
            Direction::BToA => DocId::B,
        }
    }

    pub fn target(self) -> DocId {
        self.source().other()
    }

    /// Whether the highlights go to the original document (A).
    ///
    /// Words only the original has were removed from the revision, so in this
    /// direction they are deleted rather than added.
    pub fn targets_original(self) -> bool {
        self.target() == DocId::A
    }

    /// How a target word of class `class` is presented in this direction.
    pub fn target_class(self, class: Classification) -> Classification {
        match class {
            Classification::Added if self.targets_original() => Classification::Deleted,
            other => other,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}→{}", self.source(), self.target())
    }
}

/// Stable token identifier: the token's index in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A word as reported by a document backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageWord {
    pub bbox: BBox,
    pub text: String,
}

impl PageWord {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32, text: impl Into<String>) -> Self {
        Self {
            bbox: BBox::new(x0, y0, x1, y1),
            text: text.into(),
        }
    }
}

/// One word instance, immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    /// Text as it appears in the document (used for display)
    pub text: String,
    /// Canonical form used for comparison
    pub normalized: String,
    pub bbox: BBox,
    /// Zero-based page index
    pub page: u32,
    pub doc: DocId,
}

/// All tokens of one document, stored page after page.
///
/// Every page owns a contiguous range of the arena, so a token's page is fixed
/// by construction and [`TokenId`]s stay valid for the arena's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTokens {
    doc: DocId,
    tokens: Vec<Token>,
    pages: Vec<Range<usize>>,
}

impl DocumentTokens {
    /// Build the arena from the words of each page, in page order.
    pub fn from_pages(doc: DocId, pages: Vec<Vec<PageWord>>, normalizer: &Normalizer) -> Self {
        let mut tokens = Vec::with_capacity(pages.iter().map(Vec::len).sum());
        let mut ranges = Vec::with_capacity(pages.len());

        for (page_index, words) in pages.into_iter().enumerate() {
            let start = tokens.len();
            for word in words {
                let text = word.text.trim();
                if text.is_empty() {
                    continue;
                }
                tokens.push(Token {
                    id: TokenId(tokens.len() as u32),
                    normalized: normalizer.normalize(text),
                    text: text.to_string(),
                    bbox: word.bbox,
                    page: page_index as u32,
                    doc,
                });
            }
            ranges.push(start..tokens.len());
        }

        Self {
            doc,
            tokens,
            pages: ranges,
        }
    }

    /// An arena with no pages.
    pub fn empty(doc: DocId) -> Self {
        Self {
            doc,
            tokens: Vec::new(),
            pages: Vec::new(),
        }
    }

    pub fn doc(&self) -> DocId {
        self.doc
    }

    /// Number of pages, including pages without words.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Total number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// All tokens in document order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Tokens of one page; empty for pages past the end.
    pub fn page(&self, page: u32) -> &[Token] {
        match self.pages.get(page as usize) {
            Some(range) => &self.tokens[range.clone()],
            None => &[],
        }
    }

    /// Look up a token by id.
    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id.index())
    }

    /// Display text of the given tokens joined by spaces.
    pub fn text_of(&self, ids: &[TokenId]) -> String {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
