//! Dual-direction comparison.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::annotate::{missing_annotation, ChangeMapping};
use super::direction::{DirectionOutcome, DirectionPipeline};
use super::normalize::Normalizer;
use super::options::{CompareMode, CompareOptions};
use crate::backend::{DocumentBackend, Highlight, Note};
use crate::error::{Error, Result};
use crate::model::{Color, DocId, Direction, DocumentTokens, PageWord, Point, Region};
use crate::report::{
    ComparisonReport, DirectionReport, Failure, FailureKind, PageReport, RegionReport,
    WriteOutcome,
};
use crate::vision::{VisionDiffService, VisionInput};

/// Where the missing-words note icon is placed on the page.
const NOTE_POSITION: Point = Point { x: 15.0, y: 15.0 };

/// Shared cancellation flag.
///
/// Checked before each page's annotations are written, so a page is either
/// written completely or not at all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of both directions.
#[derive(Debug, Clone)]
pub struct DualOutcome {
    /// Highlights for B
    pub a_to_b: DirectionOutcome,
    /// Highlights for A
    pub b_to_a: DirectionOutcome,
}

/// Compares two documents in both directions.
///
/// # Example
///
/// ```no_run
/// use pdfcompare::{CompareOptions, Comparer, LopdfBackend};
///
/// let mut a = LopdfBackend::load_file("catalog_v1.pdf")?;
/// let mut b = LopdfBackend::load_file("catalog_v2.pdf")?;
/// let report = Comparer::new(CompareOptions::default()).run(&mut a, &mut b)?;
/// println!("{} regions on B", report.a_to_b.region_count());
/// # Ok::<(), pdfcompare::Error>(())
/// ```
#[derive(Clone)]
pub struct Comparer {
    options: CompareOptions,
    vision: Option<(Arc<dyn VisionDiffService>, Arc<VisionInput>)>,
    changes: HashMap<Direction, ChangeMapping>,
    cancel: CancellationToken,
}

impl Comparer {
    pub fn new(options: CompareOptions) -> Self {
        Self {
            options,
            vision: None,
            changes: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a vision service (required in [`CompareMode::Vision`]).
    pub fn with_vision(mut self, service: Arc<dyn VisionDiffService>, input: VisionInput) -> Self {
        self.vision = Some((service, Arc::new(input)));
        self
    }

    /// Supply a change mapping for one direction. It takes precedence over
    /// derived and service-reported entries with the same key.
    pub fn with_changes<I, K, V>(mut self, direction: Direction, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let normalizer = Normalizer::new(self.options.normalize);
        self.changes
            .insert(direction, ChangeMapping::from_pairs(pairs, &normalizer));
        self
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Zero-based indices of the pages compared for documents of the given
    /// lengths. Pages only the longer document has are included.
    pub fn compared_pages(&self, pages_a: u32, pages_b: u32) -> Vec<u32> {
        (0..pages_a.max(pages_b))
            .filter(|&p| self.options.pages.includes_index(p))
            .collect()
    }

    /// Run both directions on already extracted tokens.
    pub fn compare_tokens(&self, a: &DocumentTokens, b: &DocumentTokens) -> Result<DualOutcome> {
        let pages = self.compared_pages(a.page_count(), b.page_count());
        self.compare_pages(a, b, &pages)
    }

    /// Run both directions over the given zero-based pages only.
    fn compare_pages(
        &self,
        a: &DocumentTokens,
        b: &DocumentTokens,
        pages: &[u32],
    ) -> Result<DualOutcome> {
        self.options.validate()?;
        if self.options.mode == CompareMode::Vision && self.vision.is_none() {
            return Err(Error::Config(
                "vision mode requires a vision diff service".to_string(),
            ));
        }

        let pipeline = DirectionPipeline::new(&self.options);

        let run = |direction: Direction| {
            let (source, target) = match direction {
                Direction::AToB => (a, b),
                Direction::BToA => (b, a),
            };
            let external = self.changes.get(&direction);
            match (&self.options.mode, &self.vision) {
                (CompareMode::Vision, Some((service, input))) => pipeline.run_vision(
                    &input.request(direction),
                    service.as_ref(),
                    target,
                    pages,
                    external,
                ),
                _ => pipeline.run_alignment(direction, source, target, pages, external),
            }
        };

        let (a_to_b, b_to_a) = if self.options.parallel {
            rayon::join(|| run(Direction::AToB), || run(Direction::BToA))
        } else {
            (run(Direction::AToB), run(Direction::BToA))
        };

        Ok(DualOutcome { a_to_b, b_to_a })
    }

    /// Extract the tokens of one document.
    ///
    /// A page whose words cannot be extracted is left empty and reported as
    /// a failure; [`Comparer::run`] then leaves it out of the comparison.
    /// Only an unreadable document is an error.
    pub fn extract<D>(&self, doc: DocId, backend: &D) -> Result<(DocumentTokens, Vec<Failure>)>
    where
        D: DocumentBackend + ?Sized,
    {
        let page_count = backend
            .page_count()
            .map_err(|e| Error::BackendUnavailable(format!("document {}: {}", doc, e)))?;

        let mut failures = Vec::new();
        let mut pages: Vec<Vec<PageWord>> = Vec::with_capacity(page_count as usize);
        for page in 0..page_count {
            if !self.options.pages.includes_index(page) {
                pages.push(Vec::new());
                continue;
            }
            match backend.get_words(page) {
                Ok(words) => pages.push(words),
                Err(e) => {
                    log::warn!("document {} page {}: extraction failed: {}", doc, page + 1, e);
                    failures.push(Failure::from_error(
                        FailureKind::Extraction,
                        doc,
                        Some(page),
                        &e,
                    ));
                    pages.push(Vec::new());
                }
            }
        }

        let normalizer = Normalizer::new(self.options.normalize);
        let tokens = DocumentTokens::from_pages(doc, pages, &normalizer);
        log::debug!(
            "document {}: {} tokens on {} pages",
            doc,
            tokens.len(),
            tokens.page_count()
        );
        Ok((tokens, failures))
    }

    /// Compare two documents and annotate both of them.
    ///
    /// B receives the highlights of the A→B direction and A those of B→A.
    /// Saving the annotated documents is left to the caller.
    pub fn run<A, B>(&self, a: &mut A, b: &mut B) -> Result<ComparisonReport>
    where
        A: DocumentBackend + ?Sized,
        B: DocumentBackend + ?Sized,
    {
        let started_at = Utc::now();

        let (tokens_a, mut failures) = self.extract(DocId::A, &*a)?;
        let (tokens_b, failures_b) = self.extract(DocId::B, &*b)?;
        failures.extend(failures_b);

        // A page either side failed to extract is skipped in both directions.
        let failed: BTreeSet<u32> = failures
            .iter()
            .filter(|f| f.kind == FailureKind::Extraction)
            .filter_map(|f| f.page)
            .collect();
        let compared_pages: Vec<u32> = self
            .compared_pages(tokens_a.page_count(), tokens_b.page_count())
            .into_iter()
            .filter(|page| {
                let skip = failed.contains(page);
                if skip {
                    log::warn!("page {} skipped: extraction failed", page + 1);
                }
                !skip
            })
            .collect();
        let outcome = self.compare_pages(&tokens_a, &tokens_b, &compared_pages)?;

        let a_to_b = self.write(outcome.a_to_b, b);
        let b_to_a = self.write(outcome.b_to_a, a);
        let cancelled = self.cancel.is_cancelled();

        let report = ComparisonReport {
            started_at,
            finished_at: Utc::now(),
            pages_a: tokens_a.page_count(),
            pages_b: tokens_b.page_count(),
            compared_pages,
            a_to_b,
            b_to_a,
            failures,
            cancelled,
        };
        log::info!(
            "comparison finished: {} regions on B, {} regions on A, {} failures",
            report.a_to_b.region_count(),
            report.b_to_a.region_count(),
            report.all_failures().count()
        );
        Ok(report)
    }

    /// Write a direction's regions and note to its target.
    fn write<D>(&self, outcome: DirectionOutcome, backend: &mut D) -> DirectionReport
    where
        D: DocumentBackend + ?Sized,
    {
        let direction = outcome.direction;
        let target = direction.target();
        let mut failures = outcome.failures;
        let mut pages = Vec::with_capacity(outcome.pages.len());
        let mut stopped = false;

        for page in outcome.pages {
            if !stopped && self.cancel.is_cancelled() {
                stopped = true;
                log::warn!("{}: cancelled before page {}", direction, page.page + 1);
                failures.push(Failure::new(
                    FailureKind::Cancelled,
                    target,
                    Some(page.page),
                    "cancelled before writing",
                ));
            }

            let regions = page
                .regions
                .into_iter()
                .map(|region| {
                    let outcome = if stopped {
                        WriteOutcome::Skipped
                    } else {
                        let highlight = self.highlight_for(&region);
                        match backend.add_highlight(region.page, &highlight) {
                            Ok(()) => WriteOutcome::Written,
                            Err(e) => {
                                log::warn!(
                                    "{}: highlight on page {} failed: {}",
                                    direction,
                                    region.page + 1,
                                    e
                                );
                                failures.push(Failure::from_error(
                                    FailureKind::AnnotationWrite,
                                    target,
                                    Some(region.page),
                                    &e,
                                ));
                                WriteOutcome::Failed(e.to_string())
                            }
                        }
                    };
                    RegionReport { region, outcome }
                })
                .collect();

            pages.push(PageReport {
                page: page.page,
                regions,
            });
        }

        let note_page = pages.first().map(|p| p.page);
        // The original is never told that text was removed from it.
        let note = if self.options.missing_note && !direction.targets_original() {
            missing_annotation(&outcome.missing)
        } else {
            None
        };
        let missing_note = match (note, note_page) {
            (Some(annotation), Some(page)) => Some(if stopped || self.cancel.is_cancelled() {
                WriteOutcome::Skipped
            } else {
                let note = Note {
                    at: NOTE_POSITION,
                    color: Color::NOTE,
                    title: annotation.title,
                    subject: annotation.subject,
                    content: annotation.content,
                };
                match backend.add_note(page, &note) {
                    Ok(()) => WriteOutcome::Written,
                    Err(e) => {
                        log::warn!("{}: missing-words note failed: {}", direction, e);
                        failures.push(Failure::from_error(
                            FailureKind::AnnotationWrite,
                            target,
                            Some(page),
                            &e,
                        ));
                        WriteOutcome::Failed(e.to_string())
                    }
                }
            }),
            _ => None,
        };

        DirectionReport {
            direction,
            source: direction.source(),
            target,
            mode: outcome.mode,
            counts: outcome.counts,
            changes: outcome.changes,
            missing: outcome.missing,
            moved: outcome.moved,
            pages,
            missing_note,
            failures,
        }
    }

    fn highlight_for(&self, region: &Region) -> Highlight {
        let (title, subject, content) = match &region.annotation {
            Some(a) => (a.title.clone(), a.subject.clone(), a.content.clone()),
            None => (region.classification.label().to_string(), String::new(), String::new()),
        };
        Highlight {
            bbox: region.bbox,
            color: region.classification.color().unwrap_or(Color::ADDED),
            opacity: self.options.highlight_opacity,
            title,
            subject,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::model::Classification;

    fn line(words: &[&str]) -> Vec<PageWord> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let x = 10.0 + i as f32 * 40.0;
                PageWord::new(x, 10.0, x + 36.0, 20.0, *w)
            })
            .collect()
    }

    #[test]
    fn test_compared_pages_cover_longer_document() {
        let comparer = Comparer::new(CompareOptions::default());
        assert_eq!(comparer.compared_pages(2, 3), vec![0, 1, 2]);

        let comparer = Comparer::new(
            CompareOptions::default().with_pages(super::super::PageSelection::Pages(vec![2])),
        );
        assert_eq!(comparer.compared_pages(2, 3), vec![1]);
    }

    #[test]
    fn test_vision_mode_requires_service() {
        let comparer = Comparer::new(CompareOptions::default().with_mode(CompareMode::Vision));
        let empty = DocumentTokens::empty(DocId::A);
        assert!(matches!(
            comparer.compare_tokens(&empty, &empty),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_run_writes_both_documents() {
        let mut a = MemoryBackend::from_words(vec![line(&["Brun", "200ml", "Vanille"])]);
        let mut b = MemoryBackend::from_words(vec![line(&["TES", "200ml"])]);

        let report = Comparer::new(CompareOptions::default())
            .run(&mut a, &mut b)
            .unwrap();

        let on_b = b.highlights_on(0);
        assert_eq!(on_b.len(), 1);
        assert_eq!(on_b[0].title, "Changed");
        assert_eq!(on_b[0].color, Color::ADDED);
        assert_eq!(on_b[0].opacity, 0.3);

        // "Vanille" is gone from B and is listed in B's note.
        let notes = b.notes();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].1.content.contains("• Vanille"));
        assert_eq!(notes[0].1.at, NOTE_POSITION);

        // A gets the reverse direction: "Brun" and "Vanille" were removed.
        let on_a = a.highlights_on(0);
        assert_eq!(on_a.len(), 2);
        assert!(on_a.iter().all(|h| h.color == Color::DELETED));
        assert_eq!(on_a[0].content, "Changed: Brun → TES");
        assert_eq!(on_a[1].content, "Deleted: Vanille");
        assert!(report
            .b_to_a
            .regions()
            .all(|r| r.classification == Classification::Deleted));
        assert!(a.notes().is_empty());
        assert_eq!(report.b_to_a.missing_note, None);
        assert!(!report.cancelled);
        assert_eq!(report.all_failures().count(), 0);
    }

    #[test]
    fn test_cancelled_before_writing() {
        let mut a = MemoryBackend::from_words(vec![line(&["Brun"])]);
        let mut b = MemoryBackend::from_words(vec![line(&["TES"])]);
        let token = CancellationToken::new();
        token.cancel();

        let report = Comparer::new(CompareOptions::default())
            .with_cancellation(token)
            .run(&mut a, &mut b)
            .unwrap();

        assert!(report.cancelled);
        assert!(a.annotations().is_empty());
        assert!(b.annotations().is_empty());
        assert_eq!(report.a_to_b.regions_written(), 0);
        assert_eq!(report.a_to_b.region_count(), 1);
        assert!(report
            .all_failures()
            .any(|f| f.kind == FailureKind::Cancelled));
    }
}
