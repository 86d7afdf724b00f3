//! One captured gesture instance, embedded per frame for DTW.

use std::fmt;

use crate::hand::features::{self, FEATURE_LEN};
use crate::hand::landmarks::FLAT_LEN;
use crate::hand::normalize::NormalizedHand;

// ── Embedding choice ───────────────────────────────────────

/// Per-frame vector used for DTW comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Embedding {
    /// 11 geometric features per frame.
    #[default]
    Features,
    /// 63 normalized landmark coordinates per frame.
    Landmarks,
}

impl Embedding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Landmarks => "landmarks",
        }
    }

    pub fn parse(s: &str) -> Option<Embedding> {
        match s {
            "features" => Some(Self::Features),
            "landmarks" => Some(Self::Landmarks),
            _ => None,
        }
    }

    /// Values per frame.
    pub fn dim(&self) -> usize {
        match self {
            Self::Features => FEATURE_LEN,
            Self::Landmarks => FLAT_LEN,
        }
    }

    /// Accept/reject threshold calibrated for this embedding's distance scale.
    pub fn default_threshold(&self) -> f32 {
        match self {
            Self::Features => 25.0,
            Self::Landmarks => 60.0,
        }
    }

    fn embed_into(&self, hand: &NormalizedHand, out: &mut Vec<f32>) {
        match self {
            Self::Features => out.extend_from_slice(features::extract(hand).as_slice()),
            Self::Landmarks => out.extend(hand.points().iter().flatten().copied()),
        }
    }
}

impl fmt::Display for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Embedded sequence ──────────────────────────────────────

/// Frames of fixed dimension stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSeq {
    dim: usize,
    values: Vec<f32>,
}

impl EmbeddingSeq {
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            values: Vec::new(),
        }
    }

    fn from_frames(frames: &[NormalizedHand], embedding: Embedding) -> Self {
        let dim = embedding.dim();
        let mut values = Vec::with_capacity(frames.len() * dim);
        for frame in frames {
            embedding.embed_into(frame, &mut values);
        }
        Self { dim, values }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.values.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector for frame `i`.
    pub fn frame(&self, i: usize) -> &[f32] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }
}

// ── Sequence model ─────────────────────────────────────────

/// A left/right pair of embedded frame sequences for one gesture.
///
/// A hand's embedding is empty exactly when that hand is absent from every
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceModel {
    embedding: Embedding,
    has_left: bool,
    has_right: bool,
    left: EmbeddingSeq,
    right: EmbeddingSeq,
}

impl SequenceModel {
    /// Build from per-frame normalized hands. Presence is decided on the
    /// normalized form: a side is present if any frame is non-zero.
    pub fn build(
        left_frames: &[NormalizedHand],
        right_frames: &[NormalizedHand],
        embedding: Embedding,
    ) -> Self {
        let has_left = left_frames.iter().any(|f| !f.is_zero());
        let has_right = right_frames.iter().any(|f| !f.is_zero());
        let side = |present: bool, frames: &[NormalizedHand]| {
            if present {
                EmbeddingSeq::from_frames(frames, embedding)
            } else {
                EmbeddingSeq::empty(embedding.dim())
            }
        };
        Self {
            embedding,
            has_left,
            has_right,
            left: side(has_left, left_frames),
            right: side(has_right, right_frames),
        }
    }

    pub fn embedding(&self) -> Embedding {
        self.embedding
    }

    pub fn has_left(&self) -> bool {
        self.has_left
    }

    pub fn has_right(&self) -> bool {
        self.has_right
    }

    pub fn left(&self) -> &EmbeddingSeq {
        &self.left
    }

    pub fn right(&self) -> &EmbeddingSeq {
        &self.right
    }

    /// True when neither hand appears in any frame.
    pub fn is_empty(&self) -> bool {
        !self.has_left && !self.has_right
    }
}
