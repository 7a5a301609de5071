//! In-memory document backend.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{DocumentBackend, Highlight, Note};
use crate::error::{Error, Result};
use crate::model::PageWord;

/// Default page size (A4 in points).
const DEFAULT_WIDTH: f32 = 595.0;
const DEFAULT_HEIGHT: f32 = 842.0;

/// One page of a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPage {
    pub width: f32,
    pub height: f32,
    pub words: Vec<PageWord>,
}

impl MemoryPage {
    pub fn new(words: Vec<PageWord>) -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            words,
        }
    }
}

/// An annotation accepted by a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WrittenAnnotation {
    Highlight { page: u32, highlight: Highlight },
    Note { page: u32, note: Note },
}

impl WrittenAnnotation {
    pub fn page(&self) -> u32 {
        match self {
            WrittenAnnotation::Highlight { page, .. } | WrittenAnnotation::Note { page, .. } => {
                *page
            }
        }
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    pages: &'a [MemoryPage],
    annotations: &'a [WrittenAnnotation],
}

/// A document held entirely in memory.
///
/// Used for tests and for callers that extract words themselves. Failures can
/// be injected per page to exercise failure isolation.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pages: Vec<MemoryPage>,
    annotations: Vec<WrittenAnnotation>,
    failing_extraction: HashSet<u32>,
    failing_writes: HashSet<u32>,
    unavailable: bool,
}

impl MemoryBackend {
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Build from the words of each page, using A4 pages.
    pub fn from_words(pages: Vec<Vec<PageWord>>) -> Self {
        Self::new(pages.into_iter().map(MemoryPage::new).collect())
    }

    /// Make `get_words` fail on a page.
    pub fn fail_extraction_on(mut self, page: u32) -> Self {
        self.failing_extraction.insert(page);
        self
    }

    /// Make annotation writes fail on a page.
    pub fn fail_writes_on(mut self, page: u32) -> Self {
        self.failing_writes.insert(page);
        self
    }

    /// Make the whole document unreadable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn pages(&self) -> &[MemoryPage] {
        &self.pages
    }

    /// Every annotation written so far, in write order.
    pub fn annotations(&self) -> &[WrittenAnnotation] {
        &self.annotations
    }

    /// Highlights written to one page.
    pub fn highlights_on(&self, page: u32) -> Vec<&Highlight> {
        self.annotations
            .iter()
            .filter_map(|a| match a {
                WrittenAnnotation::Highlight { page: p, highlight } if *p == page => {
                    Some(highlight)
                }
                _ => None,
            })
            .collect()
    }

    /// Notes written to any page.
    pub fn notes(&self) -> Vec<(u32, &Note)> {
        self.annotations
            .iter()
            .filter_map(|a| match a {
                WrittenAnnotation::Note { page, note } => Some((*page, note)),
                _ => None,
            })
            .collect()
    }

    fn check_page(&self, page: u32) -> Result<()> {
        if page as usize >= self.pages.len() {
            return Err(Error::PageOutOfRange(page, self.pages.len() as u32));
        }
        Ok(())
    }

    fn check_writable(&self, page: u32) -> Result<()> {
        self.check_page(page)?;
        if self.failing_writes.contains(&page) {
            return Err(Error::AnnotationWrite {
                page,
                message: "page rejects annotations".to_string(),
            });
        }
        Ok(())
    }
}

impl DocumentBackend for MemoryBackend {
    fn page_count(&self) -> Result<u32> {
        if self.unavailable {
            return Err(Error::BackendUnavailable(
                "in-memory document marked unavailable".to_string(),
            ));
        }
        Ok(self.pages.len() as u32)
    }

    fn get_words(&self, page: u32) -> Result<Vec<PageWord>> {
        self.check_page(page)?;
        if self.failing_extraction.contains(&page) {
            return Err(Error::Extraction {
                page,
                message: "injected extraction failure".to_string(),
            });
        }
        Ok(self.pages[page as usize].words.clone())
    }

    fn add_highlight(&mut self, page: u32, highlight: &Highlight) -> Result<()> {
        self.check_writable(page)?;
        self.annotations.push(WrittenAnnotation::Highlight {
            page,
            highlight: highlight.clone(),
        });
        Ok(())
    }

    fn add_note(&mut self, page: u32, note: &Note) -> Result<()> {
        self.check_writable(page)?;
        self.annotations.push(WrittenAnnotation::Note {
            page,
            note: note.clone(),
        });
        Ok(())
    }

    /// Writes the pages and annotations as JSON.
    fn save(&mut self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            pages: &self.pages,
            annotations: &self.annotations,
        };
        fs::write(path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(())
    }
}
