//! Similarity thresholding over raw vector hits.
//!
//! The vector store returns up to `top_k` scoped hits with cosine
//! distances. [`select_context`] converts each distance `d` to a
//! similarity `1 - d`, keeps hits at or above the threshold in store rank
//! order, and reports *why* nothing survived when that happens.

use crate::models::VectorHit;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.45;

/// Outcome of a scoped retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Chunk texts that passed the threshold, best first.
    Context(Vec<String>),
    /// The scope matched chunks, but none was similar enough.
    BelowThreshold,
    /// Nothing matched the scope, or the store could not be read.
    NoResult,
}

impl Retrieval {
    pub fn chunks(&self) -> &[String] {
        match self {
            Retrieval::Context(chunks) => chunks,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks().is_empty()
    }
}

pub fn similarity(distance: f32) -> f32 {
    1.0 - distance
}

pub fn select_context(hits: Vec<VectorHit>, threshold: f32) -> Retrieval {
    if hits.is_empty() {
        return Retrieval::NoResult;
    }
    let kept: Vec<String> = hits
        .into_iter()
        .filter(|h| similarity(h.distance) >= threshold)
        .map(|h| h.text)
        .collect();
    if kept.is_empty() {
        Retrieval::BelowThreshold
    } else {
        Retrieval::Context(kept)
    }
}
