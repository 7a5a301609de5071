//! Document backend abstraction layer.
//!
//! Provides a trait-based interface for the two things the comparison needs
//! from a document: the positioned words of each page and a way to write
//! annotations back. Implementations convert between their native coordinate
//! system and the top-left origin used by [`crate::model`].

mod extract;
mod memory;
mod pdf;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{BBox, Color, PageWord, Point};

pub use extract::{group_words_into_lines, WORD_BREAK_ADJUSTMENT};
pub use memory::{MemoryBackend, MemoryPage, WrittenAnnotation};
pub use pdf::LopdfBackend;

/// A highlight annotation to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub bbox: BBox,
    pub color: Color,
    pub opacity: f32,
    pub title: String,
    pub subject: String,
    pub content: String,
}

/// A sticky-note annotation to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Icon anchor in page space
    pub at: Point,
    pub color: Color,
    pub title: String,
    pub subject: String,
    pub content: String,
}

/// Abstract interface for document access.
///
/// Page indices are zero-based. Reading is `&self` so extraction can share the
/// backend; writing takes `&mut self` and is serialized per document.
pub trait DocumentBackend {
    /// Number of pages in the document.
    fn page_count(&self) -> Result<u32>;

    /// Words of a page in reading order.
    fn get_words(&self, page: u32) -> Result<Vec<PageWord>>;

    /// Add a highlight annotation to a page.
    fn add_highlight(&mut self, page: u32, highlight: &Highlight) -> Result<()>;

    /// Add a note annotation to a page.
    fn add_note(&mut self, page: u32, note: &Note) -> Result<()>;

    /// Write the (annotated) document to `path`.
    fn save(&mut self, path: &Path) -> Result<()>;
}

impl<T: DocumentBackend + ?Sized> DocumentBackend for &mut T {
    fn page_count(&self) -> Result<u32> {
        (**self).page_count()
    }

    fn get_words(&self, page: u32) -> Result<Vec<PageWord>> {
        (**self).get_words(page)
    }

    fn add_highlight(&mut self, page: u32, highlight: &Highlight) -> Result<()> {
        (**self).add_highlight(page, highlight)
    }

    fn add_note(&mut self, page: u32, note: &Note) -> Result<()> {
        (**self).add_note(page, note)
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        (**self).save(path)
    }
}
