//! Word-level comparison engine.
//!
//! The pipeline of one direction runs normalization, alignment, move
//! classification, region merging and annotation resolution on a source and
//! a target document. [`Comparer`] runs both directions and writes the
//! results back through a [`crate::backend::DocumentBackend`].

mod align;
mod annotate;
mod classify;
mod direction;
mod filter;
mod locate;
mod merge;
mod normalize;
mod options;
mod orchestrator;

pub use align::{align, is_partition, OpTag, Opcode};
pub use annotate::{
    missing_annotation, resolve_contradictions, AnnotationResolver, ChangeEntry, ChangeMapping,
    ChangeValue, TextSet, NEW_SENTINEL,
};
pub use classify::{FrequencyTable, MoveClassifier, ScopeClasses};
pub use direction::{DirectionOutcome, DirectionPipeline, PageHighlights};
pub use filter::WordFilter;
pub use locate::PhraseLocator;
pub use merge::{MergeTolerance, RegionMerger, REGION_ORDER};
pub use normalize::{NormalizeOptions, Normalizer};
pub use options::{
    AlignmentScope, CompareMode, CompareOptions, MovePolicy, PageSelection, DEFAULT_STOP_WORDS,
};
pub use orchestrator::{CancellationToken, Comparer, DualOutcome};
