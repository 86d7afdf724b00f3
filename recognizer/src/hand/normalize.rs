//! Translation- and scale-invariant hand representation.
//!
//! Points are shifted so the wrist sits at the origin, then divided by the
//! palm size (wrist to middle-finger MCP).

use super::landmarks::{distance, HandLandmark, HandObservation, Point3, LANDMARK_COUNT};

/// Guards the palm-size division.
pub const PALM_EPSILON: f32 = 1e-6;

/// 21 wrist-relative, palm-scaled points. All-zero means "no hand".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedHand {
    points: [Point3; LANDMARK_COUNT],
}

impl Default for NormalizedHand {
    fn default() -> Self {
        Self::zero()
    }
}

impl NormalizedHand {
    pub fn zero() -> Self {
        Self {
            points: [[0.0; 3]; LANDMARK_COUNT],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.points.iter().flatten().all(|&c| c == 0.0)
    }

    pub fn points(&self) -> &[Point3; LANDMARK_COUNT] {
        &self.points
    }

    pub fn point(&self, landmark: HandLandmark) -> Point3 {
        self.points[landmark.index()]
    }

    /// 63 values in landmark order.
    pub fn as_flat(&self) -> Vec<f32> {
        self.points.iter().flatten().copied().collect()
    }
}

/// Normalize one hand. Absent or all-zero input yields `NormalizedHand::zero()`.
/// Never produces NaN or infinity.
pub fn normalize(hand: &HandObservation) -> NormalizedHand {
    if !hand.present || hand.points.iter().flatten().all(|&c| c == 0.0) {
        return NormalizedHand::zero();
    }

    let wrist = hand.point(HandLandmark::Wrist);
    let scale = distance(&wrist, &hand.point(HandLandmark::MiddleMcp)) + PALM_EPSILON;

    let mut points = [[0.0; 3]; LANDMARK_COUNT];
    for (dst, src) in points.iter_mut().zip(hand.points.iter()) {
        for axis in 0..3 {
            dst[axis] = (src[axis] - wrist[axis]) / scale;
        }
    }

    if points.iter().flatten().any(|c| !c.is_finite()) {
        return NormalizedHand::zero();
    }
    NormalizedHand { points }
}
