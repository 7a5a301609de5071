//! Comparison reports.
//!
//! A report aggregates everything a comparison did: the regions of each page
//! and whether they were written, the resolved change mapping and missing set
//! of each direction, and every failure that was isolated along the way.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diff::{ChangeMapping, CompareMode, TextSet};
use crate::error::{Error, Result};
use crate::model::{Classification, DocId, Direction, Region};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Category of an isolated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A page's words could not be extracted; it was compared as empty
    Extraction,
    /// An annotation could not be written
    AnnotationWrite,
    /// The vision service failed; the direction used an empty diff
    ExternalService,
    /// Writing stopped because the comparison was cancelled
    Cancelled,
}

/// A failure local to one page, region or direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// Document the failure happened on
    pub doc: DocId,
    /// Zero-based page index, when the failure is tied to a page
    pub page: Option<u32>,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, doc: DocId, page: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            kind,
            doc,
            page,
            message: message.into(),
        }
    }

    /// Record an error as a failure of the given kind.
    pub fn from_error(kind: FailureKind, doc: DocId, page: Option<u32>, err: &Error) -> Self {
        Self::new(kind, doc, page, err.to_string())
    }
}

/// Token counts per classification for one direction.
///
/// `added` counts words only in B and `deleted` words only in A, whichever
/// the direction. `moved` and `unchanged` count target tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub unchanged: usize,
    pub added: usize,
    pub deleted: usize,
    pub moved: usize,
}

impl ClassCounts {
    pub fn record(&mut self, class: Classification) {
        match class {
            Classification::Unchanged => self.unchanged += 1,
            Classification::Added => self.added += 1,
            Classification::Deleted => self.deleted += 1,
            Classification::Moved => self.moved += 1,
        }
    }

    pub fn merge(&mut self, other: &ClassCounts) {
        self.unchanged += other.unchanged;
        self.added += other.added;
        self.deleted += other.deleted;
        self.moved += other.moved;
    }
}

/// What happened to one annotation write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum WriteOutcome {
    Written,
    Failed(String),
    /// Not attempted because the comparison was cancelled
    Skipped,
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// A region and the outcome of writing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    #[serde(flatten)]
    pub region: Region,
    pub outcome: WriteOutcome,
}

/// Regions of one target page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    /// Zero-based page index
    pub page: u32,
    pub regions: Vec<RegionReport>,
}

impl PageReport {
    pub fn written(&self) -> usize {
        self.regions.iter().filter(|r| r.outcome.is_written()).count()
    }
}

/// Result of one direction.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionReport {
    pub direction: Direction,
    pub source: DocId,
    pub target: DocId,
    pub mode: CompareMode,
    pub counts: ClassCounts,
    /// Resolved change mapping, new text → old text or "NEW"
    pub changes: ChangeMapping,
    /// Text deleted from the source, after contradiction resolution
    pub missing: TextSet,
    pub moved: TextSet,
    pub pages: Vec<PageReport>,
    /// Outcome of the missing-words note, if one was due
    pub missing_note: Option<WriteOutcome>,
    pub failures: Vec<Failure>,
}

impl DirectionReport {
    /// All regions of the direction, page after page.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.pages
            .iter()
            .flat_map(|p| p.regions.iter().map(|r| &r.region))
    }

    pub fn region_count(&self) -> usize {
        self.pages.iter().map(|p| p.regions.len()).sum()
    }

    pub fn regions_written(&self) -> usize {
        self.pages.iter().map(PageReport::written).sum()
    }
}

/// Result of a dual-direction comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_a: u32,
    pub pages_b: u32,
    /// Zero-based indices of the compared pages
    pub compared_pages: Vec<u32>,
    /// Highlights written to B
    pub a_to_b: DirectionReport,
    /// Highlights written to A
    pub b_to_a: DirectionReport,
    /// Extraction failures of either document
    pub failures: Vec<Failure>,
    pub cancelled: bool,
}

impl ComparisonReport {
    pub fn direction(&self, direction: Direction) -> &DirectionReport {
        match direction {
            Direction::AToB => &self.a_to_b,
            Direction::BToA => &self.b_to_a,
        }
    }

    /// Every failure of the comparison.
    pub fn all_failures(&self) -> impl Iterator<Item = &Failure> {
        self.failures
            .iter()
            .chain(&self.a_to_b.failures)
            .chain(&self.b_to_a.failures)
    }

    /// Convert the report to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        let json = match format {
            JsonFormat::Pretty => serde_json::to_string_pretty(self)?,
            JsonFormat::Compact => serde_json::to_string(self)?,
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Candidate, TokenId};

    fn direction_report() -> DirectionReport {
        let region = Region::start(
            0,
            Candidate {
                token: TokenId(0),
                bbox: BBox::new(1.0, 2.0, 3.0, 4.0),
                classification: Classification::Added,
                lookup_key: "tes".to_string(),
            },
        );
        DirectionReport {
            direction: Direction::AToB,
            source: DocId::A,
            target: DocId::B,
            mode: CompareMode::Alignment,
            counts: ClassCounts::default(),
            changes: ChangeMapping::new(),
            missing: TextSet::new(),
            moved: TextSet::new(),
            pages: vec![PageReport {
                page: 0,
                regions: vec![
                    RegionReport {
                        region: region.clone(),
                        outcome: WriteOutcome::Written,
                    },
                    RegionReport {
                        region,
                        outcome: WriteOutcome::Failed("rejected".to_string()),
                    },
                ],
            }],
            missing_note: None,
            failures: vec![Failure::new(
                FailureKind::AnnotationWrite,
                DocId::B,
                Some(0),
                "rejected",
            )],
        }
    }

    #[test]
    fn test_counts_record() {
        let mut counts = ClassCounts::default();
        counts.record(Classification::Added);
        counts.record(Classification::Added);
        counts.record(Classification::Moved);
        let mut total = ClassCounts::default();
        total.merge(&counts);
        total.merge(&counts);
        assert_eq!(total.added, 4);
        assert_eq!(total.moved, 2);
        assert_eq!(total.deleted, 0);
    }

    #[test]
    fn test_direction_report_totals() {
        let report = direction_report();
        assert_eq!(report.region_count(), 2);
        assert_eq!(report.regions_written(), 1);
        assert_eq!(report.regions().count(), 2);
    }

    #[test]
    fn test_report_to_json() {
        let now = Utc::now();
        let mut b_to_a = direction_report();
        b_to_a.direction = Direction::BToA;
        b_to_a.source = DocId::B;
        b_to_a.target = DocId::A;
        let report = ComparisonReport {
            started_at: now,
            finished_at: now,
            pages_a: 1,
            pages_b: 1,
            compared_pages: vec![0],
            a_to_b: direction_report(),
            b_to_a,
            failures: Vec::new(),
            cancelled: false,
        };

        let pretty = report.to_json(JsonFormat::Pretty).unwrap();
        assert!(pretty.contains('\n'));
        let compact = report.to_json(JsonFormat::Compact).unwrap();
        assert!(!compact.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&compact).unwrap();
        assert_eq!(value["a_to_b"]["direction"], "a_to_b");
        assert_eq!(
            value["a_to_b"]["pages"][0]["regions"][1]["outcome"]["status"],
            "failed"
        );
        assert_eq!(
            value["a_to_b"]["pages"][0]["regions"][0]["classification"],
            "added"
        );
        assert_eq!(report.all_failures().count(), 2);
        assert_eq!(report.direction(Direction::BToA).target, DocId::A);
    }
}
