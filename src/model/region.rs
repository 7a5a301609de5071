//! Classified highlight regions.

use serde::{Deserialize, Serialize};

use super::{BBox, Color, TokenId};

/// How a word relates to the opposing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Matched in place by the alignment.
    Unchanged,
    /// Present only in the revision.
    Added,
    /// Present only in the original.
    Deleted,
    /// Present in both documents, but not at a matching position.
    Moved,
}

impl Classification {
    /// Whether tokens of this class are highlighted.
    pub fn is_change(self) -> bool {
        !matches!(self, Classification::Unchanged)
    }

    /// Highlight color for this class.
    pub fn color(self) -> Option<Color> {
        match self {
            Classification::Unchanged => None,
            Classification::Added => Some(Color::ADDED),
            Classification::Deleted => Some(Color::DELETED),
            Classification::Moved => Some(Color::MOVED),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::Unchanged => "Unchanged",
            Classification::Added => "Added",
            Classification::Deleted => "Deleted",
            Classification::Moved => "Moved",
        }
    }
}

/// A classified token that is a highlight candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub token: TokenId,
    pub bbox: BBox,
    pub classification: Classification,
    /// Normalized text used to look the token up in a change mapping.
    ///
    /// For aligned words this is the token's own normalized text; for words
    /// located from a phrase it is the phrase.
    pub lookup_key: String,
}

/// One token's contribution to a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub token: TokenId,
    pub lookup_key: String,
}

/// An old → new text pair attached to a changed region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePair {
    pub old_text: String,
    pub new_text: String,
}

/// Popup text of a highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub title: String,
    pub subject: String,
    pub content: String,
}

/// A merged group of same-class tokens, highlighted as one annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Zero-based page index
    pub page: u32,
    pub classification: Classification,
    /// Minimal rectangle enclosing every contributor
    pub bbox: BBox,
    /// Contributing tokens in merge order
    pub contributors: Vec<Contributor>,
    pub change: Option<ChangePair>,
    pub annotation: Option<Annotation>,
}

impl Region {
    /// Start a region from its first candidate.
    pub fn start(page: u32, candidate: Candidate) -> Self {
        Self {
            page,
            classification: candidate.classification,
            bbox: candidate.bbox,
            contributors: vec![Contributor {
                token: candidate.token,
                lookup_key: candidate.lookup_key,
            }],
            change: None,
            annotation: None,
        }
    }

    /// Absorb a candidate of the same classification.
    pub fn absorb(&mut self, candidate: Candidate) {
        debug_assert_eq!(candidate.classification, self.classification);
        self.bbox = self.bbox.union(&candidate.bbox);
        self.contributors.push(Contributor {
            token: candidate.token,
            lookup_key: candidate.lookup_key,
        });
    }

    /// Ids of the contributing tokens.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.contributors.iter().map(|c| c.token).collect()
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u32, bbox: BBox) -> Candidate {
        Candidate {
            token: TokenId(id),
            bbox,
            classification: Classification::Added,
            lookup_key: format!("w{}", id),
        }
    }

    #[test]
    fn test_region_absorb_grows_bbox() {
        let mut region = Region::start(0, candidate(0, BBox::new(10.0, 10.0, 40.0, 20.0)));
        region.absorb(candidate(1, BBox::new(42.0, 11.0, 70.0, 21.0)));

        assert_eq!(region.bbox, BBox::new(10.0, 10.0, 70.0, 21.0));
        assert_eq!(region.token_ids(), vec![TokenId(0), TokenId(1)]);
        assert_eq!(region.len(), 2);
    }

    #[test]
    fn test_classification_colors() {
        assert_eq!(Classification::Unchanged.color(), None);
        assert_eq!(Classification::Moved.color(), Some(Color::MOVED));
        assert!(Classification::Deleted.is_change());
        assert!(!Classification::Unchanged.is_change());
    }
}
