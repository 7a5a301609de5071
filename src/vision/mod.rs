//! Vision diff service interface.
//!
//! In vision mode the differences are not computed from the extracted words
//! but reported by an external service that looks at page images. The service
//! answers per direction with the text that changed (new → old or `"NEW"`),
//! the text that is missing from the target and the text that moved.

#[cfg(feature = "vision")]
mod http;
mod parse;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Direction;

#[cfg(feature = "vision")]
pub use http::{HttpVisionService, VisionClientConfig};
pub use parse::parse_response;

/// Differences reported for one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionDiff {
    /// `(new text in target, old text in source or "NEW")`, in report order
    pub changed: Vec<(String, String)>,
    /// Text present in the source but absent from the target
    pub missing: Vec<String>,
    /// Text that only changed position
    pub moved: Vec<String>,
}

impl VisionDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.missing.is_empty() && self.moved.is_empty()
    }
}

/// Page images handed to a vision service for one direction.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub direction: Direction,
    /// Encoded page images (PNG) of the source document
    pub source_images: &'a [Vec<u8>],
    /// Encoded page images (PNG) of the target document
    pub target_images: &'a [Vec<u8>],
}

/// Page images of both documents, rendered by the caller.
#[derive(Debug, Clone, Default)]
pub struct VisionInput {
    pub images_a: Vec<Vec<u8>>,
    pub images_b: Vec<Vec<u8>>,
}

impl VisionInput {
    pub fn new(images_a: Vec<Vec<u8>>, images_b: Vec<Vec<u8>>) -> Self {
        Self { images_a, images_b }
    }

    /// Request for one direction, with source and target images swapped as needed.
    pub fn request(&self, direction: Direction) -> VisionRequest<'_> {
        let (source_images, target_images) = match direction {
            Direction::AToB => (&self.images_a, &self.images_b),
            Direction::BToA => (&self.images_b, &self.images_a),
        };
        VisionRequest {
            direction,
            source_images,
            target_images,
        }
    }
}

/// A service that reports the differences between two documents' images.
///
/// Calls block; implementations enforce their own timeout. Errors are not
/// fatal to a comparison: the direction continues with an empty diff.
pub trait VisionDiffService: Send + Sync {
    fn diff(&self, request: &VisionRequest<'_>) -> Result<VisionDiff>;
}

/// Serves fixed, precomputed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticVisionService {
    a_to_b: VisionDiff,
    b_to_a: VisionDiff,
}

impl StaticVisionService {
    pub fn new(a_to_b: VisionDiff, b_to_a: VisionDiff) -> Self {
        Self { a_to_b, b_to_a }
    }

    /// Build from two raw service responses.
    pub fn from_responses(a_to_b: &str, b_to_a: &str) -> Self {
        Self::new(parse_response(a_to_b), parse_response(b_to_a))
    }

    /// Build from two files holding raw service responses.
    pub fn from_files<P: AsRef<Path>>(a_to_b: P, b_to_a: P) -> Result<Self> {
        let forward = std::fs::read_to_string(a_to_b)?;
        let reverse = std::fs::read_to_string(b_to_a)?;
        Ok(Self::from_responses(&forward, &reverse))
    }
}

impl VisionDiffService for StaticVisionService {
    fn diff(&self, request: &VisionRequest<'_>) -> Result<VisionDiff> {
        Ok(match request.direction {
            Direction::AToB => self.a_to_b.clone(),
            Direction::BToA => self.b_to_a.clone(),
        })
    }
}
