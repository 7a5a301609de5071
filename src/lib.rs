//! # pdfcompare
//!
//! Word-level comparison of two versions of a PDF document.
//!
//! Both documents are compared in both directions. Each one receives color
//! coded highlight annotations: green for text that is new or changed, blue for
//! text that only moved. Text that disappeared is listed in a note on the
//! first compared page.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfcompare::compare_files;
//!
//! fn main() -> pdfcompare::Result<()> {
//!     let report = compare_files(
//!         "catalog_v1.pdf",
//!         "catalog_v2.pdf",
//!         "catalog_v1_annotated.pdf",
//!         "catalog_v2_annotated.pdf",
//!     )?;
//!     println!("{} changes highlighted in v2", report.a_to_b.region_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Alignment mode**: longest-matching-block word alignment with move detection
//! - **Vision mode**: differences reported by an external service, located on the page
//! - **Change labels**: replaced text is annotated with what it replaced
//! - **Failure isolation**: page and annotation failures are reported, not fatal
//! - **Parallel processing**: uses Rayon for directions and pages

pub mod backend;
pub mod detect;
pub mod diff;
pub mod error;
pub mod model;
pub mod report;
pub mod service;
pub mod vision;

// Re-export commonly used types
pub use backend::{DocumentBackend, Highlight, LopdfBackend, MemoryBackend, Note};
pub use detect::{is_pdf_bytes, sniff_bytes, sniff_path, PdfHeader};
pub use diff::{
    AlignmentScope, CancellationToken, ChangeMapping, CompareMode, CompareOptions, Comparer,
    MovePolicy, NormalizeOptions, PageSelection,
};
pub use error::{Error, Result};
pub use model::{
    BBox, Classification, Color, DocId, Direction, DocumentTokens, PageWord, Point, Region,
    Token, TokenId,
};
pub use report::{ComparisonReport, DirectionReport, Failure, FailureKind, JsonFormat};
pub use service::{CompareService, FileComparison, JobHandle};
pub use vision::{StaticVisionService, VisionDiff, VisionDiffService, VisionInput};

use std::path::Path;
use std::sync::Arc;

/// Compare two PDF files with default options and write annotated copies.
///
/// `out_a` receives A with the highlights of the B→A direction, `out_b`
/// receives B with those of A→B.
pub fn compare_files<P, Q>(a: P, b: P, out_a: Q, out_b: Q) -> Result<ComparisonReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    compare_files_with_options(a, b, out_a, out_b, CompareOptions::default())
}

/// Compare two PDF files with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfcompare::{compare_files_with_options, CompareOptions, PageSelection};
///
/// let options = CompareOptions::new()
///     .with_pages(PageSelection::parse("1-3")?)
///     .with_tolerance(5.0, 5.0);
/// let report = compare_files_with_options("a.pdf", "b.pdf", "a_out.pdf", "b_out.pdf", options)?;
/// # Ok::<(), pdfcompare::Error>(())
/// ```
pub fn compare_files_with_options<P, Q>(
    a: P,
    b: P,
    out_a: Q,
    out_b: Q,
    options: CompareOptions,
) -> Result<ComparisonReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    compare_files_with(&Comparer::new(options), a, b, out_a, out_b)
}

/// Compare two PDF files with a configured [`Comparer`].
///
/// Both inputs are opened before anything is compared; failing to open
/// either one is an error. The annotated copies are saved even when the
/// comparison was cancelled, so pages written before the cancellation keep
/// their highlights.
pub fn compare_files_with<P, Q>(
    comparer: &Comparer,
    a: P,
    b: P,
    out_a: Q,
    out_b: Q,
) -> Result<ComparisonReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let open = |path: &Path| {
        LopdfBackend::load_file(path)
            .map_err(|e| Error::BackendUnavailable(format!("{}: {}", path.display(), e)))
    };
    let mut doc_a = open(a.as_ref())?;
    let mut doc_b = open(b.as_ref())?;

    let report = comparer.run(&mut doc_a, &mut doc_b)?;

    doc_a.save(out_a.as_ref())?;
    doc_b.save(out_b.as_ref())?;
    Ok(report)
}

/// Extract the words of every page of a PDF file, in reading order.
///
/// # Example
///
/// ```no_run
/// let pages = pdfcompare::extract_words("catalog.pdf")?;
/// println!("{} words on page 1", pages[0].len());
/// # Ok::<(), pdfcompare::Error>(())
/// ```
pub fn extract_words<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<PageWord>>> {
    let backend = LopdfBackend::load_file(path)?;
    (0..backend.page_count()?)
        .map(|page| backend.get_words(page))
        .collect()
}

/// Builder for comparing PDF documents.
///
/// # Example
///
/// ```no_run
/// use pdfcompare::{Direction, PdfCompare};
///
/// let report = PdfCompare::new()
///     .sequential()
///     .with_changes(Direction::AToB, [("TES", "Brun")])
///     .compare("a.pdf", "b.pdf", "a_out.pdf", "b_out.pdf")?;
/// # Ok::<(), pdfcompare::Error>(())
/// ```
pub struct PdfCompare {
    options: CompareOptions,
    vision: Option<(Arc<dyn VisionDiffService>, VisionInput)>,
    changes: Vec<(Direction, Vec<(String, String)>)>,
    cancel: CancellationToken,
}

impl PdfCompare {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self {
            options: CompareOptions::default(),
            vision: None,
            changes: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace all options.
    pub fn with_options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Compare only the selected pages.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.options = self.options.with_pages(pages);
        self
    }

    /// Use vision mode with the given service and page images.
    pub fn with_vision(mut self, service: Arc<dyn VisionDiffService>, input: VisionInput) -> Self {
        self.options = self.options.with_mode(CompareMode::Vision);
        self.vision = Some((service, input));
        self
    }

    /// Supply `(new text, old text or "NEW")` pairs for one direction.
    pub fn with_changes<I, K, V>(mut self, direction: Direction, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        self.changes.push((direction, pairs));
        self
    }

    /// Token that cancels comparisons started by this builder.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The configured comparer.
    pub fn comparer(&self) -> Comparer {
        let mut comparer =
            Comparer::new(self.options.clone()).with_cancellation(self.cancel.clone());
        if let Some((service, input)) = &self.vision {
            comparer = comparer.with_vision(Arc::clone(service), input.clone());
        }
        for (direction, pairs) in &self.changes {
            comparer = comparer.with_changes(*direction, pairs.iter().map(|(k, v)| (k, v)));
        }
        comparer
    }

    /// Compare two PDF files and write annotated copies.
    pub fn compare<P, Q>(&self, a: P, b: P, out_a: Q, out_b: Q) -> Result<ComparisonReport>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        compare_files_with(&self.comparer(), a, b, out_a, out_b)
    }

    /// Compare two already opened documents.
    pub fn compare_backends<A, B>(&self, a: &mut A, b: &mut B) -> Result<ComparisonReport>
    where
        A: DocumentBackend + ?Sized,
        B: DocumentBackend + ?Sized,
    {
        self.comparer().run(a, b)
    }
}

impl Default for PdfCompare {
    fn default() -> Self {
        Self::new()
    }
}
