//! Comparison model types.
//!
//! Tokens are extracted once per document and never mutated afterwards;
//! everything downstream (opcodes, classifications, regions) refers to them
//! through [`TokenId`] indices into a [`DocumentTokens`] arena.

mod geometry;
mod region;
mod token;

pub use geometry::{BBox, Color, Point};
pub use region::{Annotation, Candidate, ChangePair, Classification, Contributor, Region};
pub use token::{DocId, Direction, DocumentTokens, PageWord, Token, TokenId};
