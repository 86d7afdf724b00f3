//! Compact per-frame geometric features.
//!
//! Reduces a normalized hand (63 values) to 11 scalars: five fingertip reach
//! distances, five finger bend cosines and one palm-spread value. DTW over
//! these is much cheaper than over raw landmarks.

use super::landmarks::{distance, HandLandmark, Point3};
use super::normalize::NormalizedHand;

/// Number of scalars in a feature vector.
pub const FEATURE_LEN: usize = 11;

/// Guards the cosine denominator for near-zero vectors.
const ANGLE_EPSILON: f32 = 1e-6;

/// Fixed-length feature vector for one frame.
///
/// Layout: `[0..5)` fingertip-to-wrist distances, `[5..10)` bend cosines,
/// `[10]` palm spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f32; FEATURE_LEN]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn tip_distances(&self) -> &[f32] {
        &self.0[0..5]
    }

    pub fn bend_cosines(&self) -> &[f32] {
        &self.0[5..10]
    }

    pub fn palm_spread(&self) -> f32 {
        self.0[10]
    }
}

/// Extract features from a normalized hand.
pub fn extract(hand: &NormalizedHand) -> FeatureVector {
    let wrist = hand.point(HandLandmark::Wrist);
    let tips = HandLandmark::fingertips().map(|l| hand.point(l));
    let knuckles = HandLandmark::knuckles().map(|l| hand.point(l));

    let mut out = [0.0; FEATURE_LEN];

    for (i, tip) in tips.iter().enumerate() {
        out[i] = distance(tip, &wrist);
    }

    for (i, (tip, knuckle)) in tips.iter().zip(knuckles.iter()).enumerate() {
        let finger = sub(tip, knuckle);
        let palm = sub(knuckle, &wrist);
        out[5 + i] = cosine(&finger, &palm);
    }

    let centroid = centroid(&tips);
    out[10] = tips.iter().map(|t| distance(t, &centroid)).sum::<f32>() / tips.len() as f32;

    FeatureVector(out)
}

fn sub(a: &Point3, b: &Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cosine(a: &Point3, b: &Point3) -> f32 {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let denom = distance(a, &[0.0; 3]) * distance(b, &[0.0; 3]) + ANGLE_EPSILON;
    (dot / denom).clamp(-1.0, 1.0)
}

fn centroid(points: &[Point3]) -> Point3 {
    let n = points.len() as f32;
    let mut c = [0.0; 3];
    for p in points {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    [c[0] / n, c[1] / n, c[2] / n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::{test_hand_points, HandObservation};
    use crate::hand::normalize::normalize;

    fn normalized(origin: Point3, spread: f32) -> NormalizedHand {
        normalize(&HandObservation::from_points(&test_hand_points(origin, spread)).unwrap())
    }

    #[test]
    fn test_zero_hand_gives_zero_features() {
        let f = extract(&NormalizedHand::zero());
        assert!(f.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_layout() {
        let f = extract(&normalized([0.5, 0.5, 0.0], 1.0));
        assert_eq!(f.as_slice().len(), FEATURE_LEN);
        assert_eq!(f.tip_distances().len(), 5);
        assert_eq!(f.bend_cosines().len(), 5);
        assert!(f.tip_distances().iter().all(|&d| d > 0.0));
        assert!(f.palm_spread() > 0.0);
    }

    #[test]
    fn test_straight_fingers_have_cosine_near_one() {
        // Fingers in the test hand run straight away from the wrist.
        let f = extract(&normalized([0.5, 0.5, 0.0], 1.0));
        for &c in f.bend_cosines() {
            assert!(c > 0.9, "cosine {}", c);
            assert!(c <= 1.0);
        }
    }

    #[test]
    fn test_scale_invariant_features() {
        let a = extract(&normalized([0.2, 0.9, 0.0], 1.5));
        let b = extract(&normalized([0.7, 0.3, 0.0], 0.4));
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-3, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_cosine_zero_vector_is_finite() {
        assert_eq!(cosine(&[0.0; 3], &[1.0, 0.0, 0.0]), 0.0);
        assert!((cosine(&[2.0, 0.0, 0.0], &[-3.0, 0.0, 0.0]) + 1.0).abs() < 1e-5);
    }
}
