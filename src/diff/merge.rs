//! Spatial merging of highlight candidates into regions.

use serde::{Deserialize, Serialize};

use crate::model::{Candidate, Classification, Region};

/// Classes in the order their regions are emitted.
pub const REGION_ORDER: [Classification; 3] = [
    Classification::Added,
    Classification::Moved,
    Classification::Deleted,
];

/// Distances under which neighbouring boxes join one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeTolerance {
    pub x: f32,
    pub y: f32,
}

impl Default for MergeTolerance {
    fn default() -> Self {
        Self { x: 10.0, y: 10.0 }
    }
}

/// Clusters same-class candidates of one page into line-wise regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionMerger {
    tolerance: MergeTolerance,
}

impl RegionMerger {
    pub fn new(tolerance: MergeTolerance) -> Self {
        Self { tolerance }
    }

    /// Merge candidates of a single classification.
    ///
    /// Candidates are visited in `(y0, x0)` order. The next candidate joins
    /// the open region when both its top and bottom edges are within the
    /// vertical tolerance of the region's, and it starts no further than the
    /// horizontal tolerance right of the region's right edge.
    pub fn merge(&self, page: u32, mut candidates: Vec<Candidate>) -> Vec<Region> {
        candidates.sort_by(|l, r| {
            l.bbox
                .y0
                .total_cmp(&r.bbox.y0)
                .then(l.bbox.x0.total_cmp(&r.bbox.x0))
        });

        let mut regions: Vec<Region> = Vec::new();
        let mut current: Option<Region> = None;

        for candidate in candidates {
            match current.as_mut() {
                Some(region)
                    if region.classification == candidate.classification
                        && self.joins(region, &candidate) =>
                {
                    region.absorb(candidate);
                }
                _ => {
                    if let Some(done) = current.take() {
                        regions.push(done);
                    }
                    current = Some(Region::start(page, candidate));
                }
            }
        }
        regions.extend(current);
        regions
    }

    /// Merge a page's candidates of every class, grouped in [`REGION_ORDER`].
    pub fn merge_page(&self, page: u32, candidates: Vec<Candidate>) -> Vec<Region> {
        let mut regions = Vec::new();
        let mut rest = candidates;
        for class in REGION_ORDER {
            let (group, others): (Vec<_>, Vec<_>) =
                rest.into_iter().partition(|c| c.classification == class);
            rest = others;
            regions.extend(self.merge(page, group));
        }
        regions
    }

    fn joins(&self, region: &Region, next: &Candidate) -> bool {
        let cur = &region.bbox;
        let nb = &next.bbox;
        (cur.y0 - nb.y0).abs() < self.tolerance.y
            && (cur.y1 - nb.y1).abs() < self.tolerance.y
            && nb.x0 <= cur.x1 + self.tolerance.x
    }
}
