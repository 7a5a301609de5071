//! Page geometry: boxes, points and highlight colors.
//!
//! All coordinates are in page space with a top-left origin, so `y0` is the
//! top edge and grows downwards. Backends convert to and from their native
//! coordinate system at the boundary.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box `(x0, y0, x1, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a box, swapping coordinates if they are given in reverse order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// The smallest box enclosing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// The smallest box enclosing every box of the iterator.
    pub fn enclosing<'a, I>(boxes: I) -> Option<BBox>
    where
        I: IntoIterator<Item = &'a BBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BBox>, b| match acc {
                Some(acc) => Some(acc.union(b)),
                None => Some(*b),
            })
    }
}

/// A point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Green, used for added and changed words.
    pub const ADDED: Color = Color::rgb(0.0, 1.0, 0.0);
    /// Blue, used for words that only moved.
    pub const MOVED: Color = Color::rgb(0.0, 0.5, 1.0);
    /// Red, used for deleted words.
    pub const DELETED: Color = Color::rgb(1.0, 0.0, 0.0);
    /// Dark red, used for the missing-words note icon.
    pub const NOTE: Color = Color::rgb(0.9, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Components as an array.
    pub fn components(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}
