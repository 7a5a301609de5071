//! The comparison pipeline of a single direction.
//!
//! A direction compares a source document against a target document and
//! produces the target's highlight regions together with the resolved change
//! mapping and missing set. Both directions of a dual comparison run this same
//! pipeline with the roles swapped; neither touches the other's tokens.
//! When the target is the original, its unmatched words are shown as deleted.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::align::{align, OpTag};
use super::annotate::{resolve_contradictions, AnnotationResolver, ChangeMapping, ChangeValue, TextSet};
use super::classify::MoveClassifier;
use super::filter::WordFilter;
use super::locate::PhraseLocator;
use super::merge::{MergeTolerance, RegionMerger};
use super::normalize::Normalizer;
use super::options::{AlignmentScope, CompareMode, CompareOptions};
use crate::model::{Candidate, Classification, Direction, DocumentTokens, Region, Token};
use crate::report::{ClassCounts, Failure, FailureKind};
use crate::vision::{VisionDiff, VisionDiffService, VisionRequest};

/// Regions of one target page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageHighlights {
    /// Zero-based page index
    pub page: u32,
    pub regions: Vec<Region>,
}

/// Everything one direction computed, before any write.
#[derive(Debug, Clone)]
pub struct DirectionOutcome {
    pub direction: Direction,
    pub mode: CompareMode,
    /// One entry per compared page, in page order
    pub pages: Vec<PageHighlights>,
    pub changes: ChangeMapping,
    pub missing: TextSet,
    pub moved: TextSet,
    pub counts: ClassCounts,
    pub failures: Vec<Failure>,
}

impl DirectionOutcome {
    /// All regions, page after page.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.pages.iter().flat_map(|p| p.regions.iter())
    }
}

/// What one alignment scope contributes to its direction.
#[derive(Default)]
struct ScopeResult {
    candidates: Vec<Candidate>,
    /// Derived `(key, new display, old display)` entries
    changes: Vec<(String, String, String)>,
    missing: Vec<String>,
    moved: Vec<String>,
    counts: ClassCounts,
}

/// Runs the pipeline of one direction with a fixed set of options.
pub struct DirectionPipeline<'a> {
    options: &'a CompareOptions,
    normalizer: Normalizer,
    filter: WordFilter,
    merger: RegionMerger,
    classifier: MoveClassifier,
}

impl<'a> DirectionPipeline<'a> {
    pub fn new(options: &'a CompareOptions) -> Self {
        Self {
            options,
            normalizer: Normalizer::new(options.normalize),
            filter: WordFilter::from_options(options),
            merger: RegionMerger::new(MergeTolerance {
                x: options.x_tolerance,
                y: options.y_tolerance,
            }),
            classifier: MoveClassifier::new(options.move_policy),
        }
    }

    /// Word-alignment mode.
    ///
    /// `pages` are the zero-based indices to compare; a page missing from
    /// either document is compared as empty. `external` entries override
    /// derived ones on key collisions.
    pub fn run_alignment(
        &self,
        direction: Direction,
        source: &DocumentTokens,
        target: &DocumentTokens,
        pages: &[u32],
        external: Option<&ChangeMapping>,
    ) -> DirectionOutcome {
        let scopes: Vec<(Vec<&Token>, Vec<&Token>)> = match self.options.scope {
            AlignmentScope::Page => pages
                .iter()
                .map(|&p| (source.page(p).iter().collect(), target.page(p).iter().collect()))
                .collect(),
            AlignmentScope::Document => vec![(
                pages.iter().flat_map(|&p| source.page(p)).collect(),
                pages.iter().flat_map(|&p| target.page(p)).collect(),
            )],
        };

        let results: Vec<ScopeResult> = if self.options.parallel {
            scopes
                .par_iter()
                .map(|(s, t)| self.align_scope(direction, s, t))
                .collect()
        } else {
            scopes.iter().map(|(s, t)| self.align_scope(direction, s, t)).collect()
        };

        let mut changes = ChangeMapping::new();
        let mut missing = TextSet::new();
        let mut moved = TextSet::new();
        let mut counts = ClassCounts::default();
        let mut candidates = Vec::new();

        for result in results {
            for (key, new_text, old_text) in result.changes {
                changes.insert(key, new_text, ChangeValue::Replaced(old_text));
            }
            for text in &result.missing {
                missing.insert(text, &self.normalizer);
            }
            for text in &result.moved {
                moved.insert(text, &self.normalizer);
            }
            counts.merge(&result.counts);
            candidates.extend(result.candidates);
        }

        if let Some(external) = external {
            changes.overlay(external);
        }
        changes.filter_keys(&self.filter);
        missing.filter(&self.filter);
        resolve_contradictions(&mut missing, &changes, &self.normalizer);

        let pages = self.build_pages(target, pages, candidates, &changes);
        log::info!(
            "{}: {} added, {} moved, {} deleted tokens; {} changes, {} missing",
            direction,
            counts.added,
            counts.moved,
            counts.deleted,
            changes.len(),
            missing.len()
        );

        DirectionOutcome {
            direction,
            mode: CompareMode::Alignment,
            pages,
            changes,
            missing,
            moved,
            counts,
            failures: Vec::new(),
        }
    }

    /// Vision mode: differences come from `service`, words are located on
    /// the target.
    pub fn run_vision(
        &self,
        request: &VisionRequest<'_>,
        service: &dyn VisionDiffService,
        target: &DocumentTokens,
        pages: &[u32],
        external: Option<&ChangeMapping>,
    ) -> DirectionOutcome {
        let direction = request.direction;
        let mut failures = Vec::new();
        let diff = match service.diff(request) {
            Ok(diff) => diff,
            Err(e) => {
                log::warn!("{}: vision service failed, using an empty diff: {}", direction, e);
                failures.push(Failure::from_error(
                    FailureKind::ExternalService,
                    direction.target(),
                    None,
                    &e,
                ));
                VisionDiff::default()
            }
        };

        let mut changes = ChangeMapping::from_pairs(diff.changed, &self.normalizer);
        if let Some(external) = external {
            changes.overlay(external);
        }
        changes.filter_keys(&self.filter);

        let mut missing = TextSet::new();
        for text in &diff.missing {
            missing.insert(text, &self.normalizer);
        }
        missing.filter(&self.filter);
        resolve_contradictions(&mut missing, &changes, &self.normalizer);

        // Moved phrases are reported as given; only blanks are dropped.
        let mut moved = TextSet::new();
        for text in &diff.moved {
            moved.insert(text, &self.normalizer);
        }

        let locator = PhraseLocator::new(
            &self.normalizer,
            &self.filter,
            self.options.max_highlights_per_word,
        );
        let mut candidates = locator.locate(
            changes.iter().map(|(_, e)| e.new_text.as_str()),
            direction.target_class(Classification::Added),
            target,
            pages,
        );
        candidates.extend(locator.locate(moved.iter(), Classification::Moved, target, pages));

        let mut counts = ClassCounts::default();
        for c in &candidates {
            counts.record(c.classification);
        }

        let pages = self.build_pages(target, pages, candidates, &changes);
        log::info!(
            "{} (vision): {} changes, {} missing, {} moved",
            direction,
            changes.len(),
            missing.len(),
            moved.len()
        );

        DirectionOutcome {
            direction,
            mode: CompareMode::Vision,
            pages,
            changes,
            missing,
            moved,
            counts,
            failures,
        }
    }

    fn align_scope(&self, direction: Direction, source: &[&Token], target: &[&Token]) -> ScopeResult {
        let src: Vec<&str> = source.iter().map(|t| t.normalized.as_str()).collect();
        let tgt: Vec<&str> = target.iter().map(|t| t.normalized.as_str()).collect();
        let opcodes = align(&src, &tgt);
        let classes = self.classifier.classify(&src, &tgt, &opcodes);

        let mut result = ScopeResult::default();

        for (token, class) in target.iter().zip(&classes.target) {
            let shown = direction.target_class(*class);
            result.counts.record(shown);
            if shown == Classification::Moved {
                result.moved.push(token.text.clone());
            }
            if shown.is_change() && self.filter.accepts(&token.normalized) {
                result.candidates.push(Candidate {
                    token: token.id,
                    bbox: token.bbox,
                    classification: shown,
                    lookup_key: token.normalized.clone(),
                });
            }
        }
        // Source-only words are deleted from the original's point of view,
        // or added when the source is the revision.
        let source_only = classes
            .source
            .iter()
            .filter(|c| **c == Classification::Deleted)
            .count();
        if direction.targets_original() {
            result.counts.added += source_only;
        } else {
            result.counts.deleted += source_only;
        }

        for op in opcodes.iter().filter(|op| !op.is_equal()) {
            let deleted: Vec<&Token> = op
                .a()
                .filter(|&i| classes.source[i] == Classification::Deleted)
                .map(|i| source[i])
                .collect();
            if !deleted.is_empty() {
                result.missing.push(join_display(&deleted));
            }

            if op.tag() != OpTag::Replace || !self.options.derive_changes || deleted.is_empty() {
                continue;
            }
            let added: Vec<&Token> = op
                .b()
                .filter(|&j| classes.target[j] == Classification::Added)
                .map(|j| target[j])
                .collect();
            if added.is_empty() {
                continue;
            }

            let new_text = join_display(&added);
            let old_text = join_display(&deleted);
            let key = added
                .iter()
                .map(|t| t.normalized.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            result.changes.push((key, new_text.clone(), old_text.clone()));
            for token in &added {
                result
                    .changes
                    .push((token.normalized.clone(), new_text.clone(), old_text.clone()));
            }
        }

        log::debug!(
            "scope of {} / {} tokens: {} opcodes, {} candidates",
            source.len(),
            target.len(),
            opcodes.len(),
            result.candidates.len()
        );
        result
    }

    fn build_pages(
        &self,
        target: &DocumentTokens,
        pages: &[u32],
        candidates: Vec<Candidate>,
        changes: &ChangeMapping,
    ) -> Vec<PageHighlights> {
        let mut by_page: BTreeMap<u32, Vec<Candidate>> = BTreeMap::new();
        for candidate in candidates {
            if let Some(token) = target.get(candidate.token) {
                by_page.entry(token.page).or_default().push(candidate);
            }
        }

        let resolver = AnnotationResolver::new(changes);
        pages
            .iter()
            .map(|&page| {
                let candidates = by_page.remove(&page).unwrap_or_default();
                let mut regions = self.merger.merge_page(page, candidates);
                for region in &mut regions {
                    resolver.resolve(region, target);
                }
                PageHighlights { page, regions }
            })
            .collect()
    }
}

fn join_display(tokens: &[&Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
