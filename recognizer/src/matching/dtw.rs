//! Dynamic time warping between sequence models, and ranking against a
//! reference library.

use super::library::ReferenceLibrary;
use super::sequence::{EmbeddingSeq, SequenceModel};

/// How to treat two models that disagree on which hands are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandPolicy {
    /// Any presence mismatch makes the pair incomparable (`+inf`).
    #[default]
    Strict,
    /// Sum over the hands present in both; `+inf` only if none are shared.
    Lenient,
}

impl HandPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }

    pub fn parse(s: &str) -> Option<HandPolicy> {
        match s {
            "strict" => Some(Self::Strict),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }
}

/// Best match of a recognition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub label: String,
    /// DTW cost of the closest reference, `+inf` when nothing was comparable.
    pub distance: f32,
}

/// L2 distance between two frame vectors of equal length.
fn step_cost(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Classic DTW over two embedded sequences, O(n·m) time, O(m) memory.
/// Empty input on either side yields `+inf`.
pub fn dtw(a: &EmbeddingSeq, b: &EmbeddingSeq) -> f32 {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 || a.dim() != b.dim() {
        return f32::INFINITY;
    }

    let mut prev = vec![f32::INFINITY; m + 1];
    let mut curr = vec![f32::INFINITY; m + 1];
    prev[0] = 0.0;

    for i in 1..=n {
        curr[0] = f32::INFINITY;
        let row = a.frame(i - 1);
        for j in 1..=m {
            let cost = step_cost(row, b.frame(j - 1));
            let best = prev[j - 1].min(prev[j]).min(curr[j - 1]);
            curr[j] = cost + best;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Combined left/right distance between two models.
pub fn distance(a: &SequenceModel, b: &SequenceModel, policy: HandPolicy) -> f32 {
    if policy == HandPolicy::Strict
        && (a.has_left() != b.has_left() || a.has_right() != b.has_right())
    {
        return f32::INFINITY;
    }

    let mut total = 0.0;
    let mut compared = false;
    if a.has_left() && b.has_left() {
        total += dtw(a.left(), b.left());
        compared = true;
    }
    if a.has_right() && b.has_right() {
        total += dtw(a.right(), b.right());
        compared = true;
    }

    if compared {
        total
    } else {
        f32::INFINITY
    }
}

/// Rank every sign by its nearest example, ascending by distance.
/// Ties keep sign-name order.
pub fn rank(
    query: &SequenceModel,
    library: &ReferenceLibrary,
    policy: HandPolicy,
) -> Vec<(String, f32)> {
    let mut ranked: Vec<(String, f32)> = library
        .iter()
        .map(|(name, examples)| {
            let best = examples
                .iter()
                .map(|example| distance(query, example, policy))
                .fold(f32::INFINITY, f32::min);
            (name.to_string(), best)
        })
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::{test_hand_points, HandObservation};
    use crate::hand::normalize::{normalize, NormalizedHand};
    use crate::matching::sequence::Embedding;

    fn hand(origin: [f32; 3], spread: f32) -> NormalizedHand {
        normalize(&HandObservation::from_points(&test_hand_points(origin, spread)).unwrap())
    }

    /// Hand that bends its fingers a bit more every frame.
    fn moving(frames: usize, bend: f32) -> Vec<NormalizedHand> {
        (0..frames)
            .map(|i| {
                let mut points = test_hand_points([0.5, 0.5, 0.0], 1.0);
                for p in points.iter_mut().skip(1) {
                    p[0] += bend * i as f32 * 0.01;
                }
                normalize(&HandObservation::from_points(&points).unwrap())
            })
            .collect()
    }

    fn zeros(n: usize) -> Vec<NormalizedHand> {
        vec![NormalizedHand::zero(); n]
    }

    #[test]
    fn test_self_distance_is_zero() {
        for embedding in [Embedding::Features, Embedding::Landmarks] {
            let m = SequenceModel::build(&moving(20, 1.0), &moving(20, 2.0), embedding);
            assert_eq!(distance(&m, &m, HandPolicy::Strict), 0.0);
        }
    }

    #[test]
    fn test_symmetric() {
        let a = SequenceModel::build(&moving(18, 1.0), &zeros(18), Embedding::Landmarks);
        let b = SequenceModel::build(&moving(25, 3.0), &zeros(25), Embedding::Landmarks);
        let ab = distance(&a, &b, HandPolicy::Strict);
        let ba = distance(&b, &a, HandPolicy::Strict);
        assert!(ab > 0.0 && ab.is_finite());
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_dtw_absorbs_time_stretch() {
        let still = vec![hand([0.5, 0.5, 0.0], 1.0); 10];
        let longer = vec![hand([0.5, 0.5, 0.0], 1.0); 30];
        let a = SequenceModel::build(&still, &[], Embedding::Features);
        let b = SequenceModel::build(&longer, &[], Embedding::Features);
        assert_eq!(distance(&a, &b, HandPolicy::Strict), 0.0);
    }

    #[test]
    fn test_strict_mismatch_is_infinite() {
        let left_only = SequenceModel::build(&moving(10, 1.0), &zeros(10), Embedding::Features);
        let both = SequenceModel::build(&moving(10, 1.0), &moving(10, 1.0), Embedding::Features);
        assert_eq!(distance(&left_only, &both, HandPolicy::Strict), f32::INFINITY);
        assert_eq!(distance(&left_only, &both, HandPolicy::Lenient), 0.0);
    }

    #[test]
    fn test_no_shared_hand_is_infinite_under_both_policies() {
        let left = SequenceModel::build(&moving(10, 1.0), &[], Embedding::Features);
        let right = SequenceModel::build(&[], &moving(10, 1.0), Embedding::Features);
        assert_eq!(distance(&left, &right, HandPolicy::Strict), f32::INFINITY);
        assert_eq!(distance(&left, &right, HandPolicy::Lenient), f32::INFINITY);
    }

    #[test]
    fn test_all_zero_query_never_matches() {
        let query = SequenceModel::build(&zeros(30), &zeros(30), Embedding::Features);
        let reference = SequenceModel::build(&moving(30, 1.0), &[], Embedding::Features);
        assert_eq!(distance(&query, &reference, HandPolicy::Strict), f32::INFINITY);
        assert_eq!(distance(&query, &query, HandPolicy::Strict), f32::INFINITY);
    }

    #[test]
    fn test_two_hands_sum() {
        let a = SequenceModel::build(&moving(12, 1.0), &moving(12, 1.0), Embedding::Landmarks);
        let b = SequenceModel::build(&moving(12, 2.0), &moving(12, 3.0), Embedding::Landmarks);
        let left = dtw(a.left(), b.left());
        let right = dtw(a.right(), b.right());
        assert!((distance(&a, &b, HandPolicy::Strict) - (left + right)).abs() < 1e-4);
    }

    #[test]
    fn test_dtw_empty_side() {
        let m = SequenceModel::build(&moving(5, 1.0), &[], Embedding::Features);
        assert_eq!(dtw(m.left(), m.right()), f32::INFINITY);
    }

    #[test]
    fn test_rank_uses_nearest_example() {
        let mut library = ReferenceLibrary::default();
        library.insert("FAR", SequenceModel::build(&moving(15, 9.0), &[], Embedding::Landmarks));
        library.insert("NEAR", SequenceModel::build(&moving(15, 6.0), &[], Embedding::Landmarks));
        library.insert("NEAR", SequenceModel::build(&moving(15, 1.0), &[], Embedding::Landmarks));
        library.insert("RIGHT", SequenceModel::build(&[], &moving(15, 1.0), Embedding::Landmarks));

        let query = SequenceModel::build(&moving(15, 1.0), &[], Embedding::Landmarks);
        let ranked = rank(&query, &library, HandPolicy::Strict);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0], ("NEAR".to_string(), 0.0));
        assert_eq!(ranked[1].0, "FAR");
        assert_eq!(ranked[2], ("RIGHT".to_string(), f32::INFINITY));
    }

    #[test]
    fn test_rank_empty_library() {
        let query = SequenceModel::build(&moving(5, 1.0), &[], Embedding::Features);
        assert!(rank(&query, &ReferenceLibrary::default(), HandPolicy::Strict).is_empty());
    }
}
