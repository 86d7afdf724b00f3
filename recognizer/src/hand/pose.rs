//! Hand pose classification for gesture-triggered capture.
//!
//! An open palm starts a capture and a fist stops it. The heuristic is a
//! fixed threshold on mean fingertip reach, kept behind `GestureDetector`
//! so a different classifier can be swapped in without touching the engine.

use tracing::debug;

use super::landmarks::{distance, HandLandmark, HandObservation};

/// Coarse pose of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandPose {
    /// All fingers extended.
    Open,
    /// Fingers curled into a fist.
    Closed,
    /// Anything else. An absent hand also classifies as neutral, though the
    /// gesture trigger only ever classifies hands that are present.
    Neutral,
}

impl HandPose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Neutral => "neutral",
        }
    }
}

/// Classifies a single hand observation.
pub trait GestureDetector: Send + Sync {
    fn classify(&self, hand: &HandObservation) -> HandPose;
}

/// Mean fingertip-to-wrist distance, measured in detector coordinates.
///
/// Open when the reach exceeds `open_threshold`, closed below
/// `closed_threshold`, neutral in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingertipReachDetector {
    pub open_threshold: f32,
    pub closed_threshold: f32,
}

impl Default for FingertipReachDetector {
    fn default() -> Self {
        Self {
            open_threshold: 0.15,
            closed_threshold: 0.10,
        }
    }
}

impl FingertipReachDetector {
    pub fn new(open_threshold: f32, closed_threshold: f32) -> Self {
        Self {
            open_threshold,
            closed_threshold,
        }
    }
}

/// Mean distance from the wrist to the five fingertips.
pub fn mean_reach(hand: &HandObservation) -> f32 {
    let wrist = hand.point(HandLandmark::Wrist);
    let tips = HandLandmark::fingertips();
    tips.iter()
        .map(|&t| distance(&hand.point(t), &wrist))
        .sum::<f32>()
        / tips.len() as f32
}

impl GestureDetector for FingertipReachDetector {
    fn classify(&self, hand: &HandObservation) -> HandPose {
        if !hand.present {
            return HandPose::Neutral;
        }
        let reach = mean_reach(hand);
        let pose = if reach > self.open_threshold {
            HandPose::Open
        } else if reach < self.closed_threshold {
            HandPose::Closed
        } else {
            HandPose::Neutral
        };
        debug!(reach, pose = pose.as_str(), "classified hand pose");
        pose
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Test hand whose mean fingertip reach is roughly `1.04 * spread`.
#[cfg(test)]
pub(crate) fn hand_with_spread(spread: f32) -> HandObservation {
    let points = super::landmarks::test_hand_points([0.5, 0.6, 0.0], spread);
    HandObservation::from_points(&points).unwrap_or_default()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_palm() {
        let d = FingertipReachDetector::default();
        assert_eq!(d.classify(&hand_with_spread(0.3)), HandPose::Open);
    }

    #[test]
    fn test_fist() {
        let d = FingertipReachDetector::default();
        assert_eq!(d.classify(&hand_with_spread(0.05)), HandPose::Closed);
    }

    #[test]
    fn test_between_thresholds_is_neutral() {
        let d = FingertipReachDetector::default();
        assert_eq!(d.classify(&hand_with_spread(0.12)), HandPose::Neutral);
    }

    #[test]
    fn test_absent_hand_is_neutral() {
        let d = FingertipReachDetector::default();
        assert_eq!(d.classify(&HandObservation::absent()), HandPose::Neutral);
    }

    #[test]
    fn test_custom_thresholds() {
        let d = FingertipReachDetector::new(2.0, 0.5);
        assert_eq!(d.classify(&hand_with_spread(1.0)), HandPose::Neutral);
        assert_eq!(d.classify(&hand_with_spread(0.3)), HandPose::Closed);
    }

    #[test]
    fn test_mean_reach_scales_with_hand() {
        let small = mean_reach(&hand_with_spread(0.1));
        let large = mean_reach(&hand_with_spread(0.2));
        assert!((large / small - 2.0).abs() < 1e-3);
    }
}
