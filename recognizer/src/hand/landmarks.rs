//! Hand landmark definitions and the detector boundary.
//!
//! Models the 21 keypoints per hand produced by MediaPipe-style hand
//! detectors, and folds raw detector output (zero or more hands, optionally
//! labeled) into exactly two `HandObservation` slots before any matching
//! logic runs.

use tracing::{debug, warn};

// ── Landmark definitions ───────────────────────────────────

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

/// Length of a flattened hand (21 × xyz).
pub const FLAT_LEN: usize = LANDMARK_COUNT * 3;

/// A 3D point in detector coordinates.
pub type Point3 = [f32; 3];

/// The 21 hand landmarks in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// Fingertips, thumb first.
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }

    /// Knuckle paired with each fingertip in `fingertips()` order.
    /// The thumb uses its MCP joint, the other fingers their MCP knuckle.
    pub fn knuckles() -> [HandLandmark; 5] {
        [
            Self::ThumbMcp,
            Self::IndexMcp,
            Self::MiddleMcp,
            Self::RingMcp,
            Self::PinkyMcp,
        ]
    }
}

// ── Hand enum ──────────────────────────────────────────────

/// Which hand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse "left" / "right".
    pub fn parse(s: &str) -> Option<Hand> {
        match s {
            "left" => Some(Hand::Left),
            "right" => Some(Hand::Right),
            _ => None,
        }
    }
}

// ── Observations ───────────────────────────────────────────

/// One hand slot for one frame, after boundary cleanup.
///
/// `present` is false for an absent hand, in which case all points are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandObservation {
    pub present: bool,
    pub points: [Point3; LANDMARK_COUNT],
}

impl Default for HandObservation {
    fn default() -> Self {
        Self::absent()
    }
}

impl HandObservation {
    /// An absent hand (all-zero points).
    pub fn absent() -> Self {
        Self {
            present: false,
            points: [[0.0; 3]; LANDMARK_COUNT],
        }
    }

    /// Build from exactly 21 points. Non-finite coordinates become 0;
    /// an all-zero result counts as absent.
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        if points.len() != LANDMARK_COUNT {
            return None;
        }
        let mut out = [[0.0; 3]; LANDMARK_COUNT];
        for (dst, src) in out.iter_mut().zip(points) {
            for axis in 0..3 {
                dst[axis] = finite_or_zero(src[axis]);
            }
        }
        let present = out.iter().flatten().any(|&c| c != 0.0);
        Some(Self {
            present,
            points: out,
        })
    }

    /// Build from a flattened 63-value vector, as kept by reference stores.
    pub fn from_flat(values: &[f32]) -> Option<Self> {
        if values.len() != FLAT_LEN {
            return None;
        }
        let points: Vec<Point3> = values
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self::from_points(&points)
    }

    /// Flatten to 63 values (x0, y0, z0, x1, ...).
    pub fn to_flat(&self) -> Vec<f32> {
        self.points.iter().flatten().copied().collect()
    }

    /// Position of a landmark.
    pub fn point(&self, landmark: HandLandmark) -> Point3 {
        self.points[landmark.index()]
    }
}

/// Detector output for one hand, before slot assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHand {
    /// Handedness label if the detector provides one.
    pub label: Option<Hand>,
    /// Keypoints in detector order; expected to hold 21 entries.
    pub points: Vec<Point3>,
}

/// Per-frame detector output: zero, one, or two (or more) hands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub hands: Vec<DetectedHand>,
}

impl RawFrame {
    /// Frame with no hands detected.
    pub fn empty() -> Self {
        Self { hands: Vec::new() }
    }

    /// Frame with a single hand.
    pub fn single(label: Option<Hand>, points: Vec<Point3>) -> Self {
        Self {
            hands: vec![DetectedHand { label, points }],
        }
    }

    /// Fold detector hands into (left, right) slots.
    ///
    /// Labeled hands claim their own slot first. A hand that is unlabeled, or
    /// whose slot is already taken, fills the first free slot in detection
    /// order (left, then right). Hands beyond two are dropped, and hands with
    /// the wrong number of points are dropped.
    pub fn observations(&self) -> (HandObservation, HandObservation) {
        let mut slots: [Option<HandObservation>; 2] = [None, None];
        let mut pending: Vec<HandObservation> = Vec::new();

        for (i, detected) in self.hands.iter().enumerate() {
            let Some(obs) = HandObservation::from_points(&detected.points) else {
                warn!(
                    "dropping detected hand {}: expected {} points, got {}",
                    i,
                    LANDMARK_COUNT,
                    detected.points.len(),
                );
                continue;
            };
            match detected.label {
                Some(hand) if slots[slot_index(hand)].is_none() => {
                    slots[slot_index(hand)] = Some(obs);
                }
                _ => pending.push(obs),
            }
        }

        for obs in pending {
            match slots.iter().position(Option::is_none) {
                Some(free) => slots[free] = Some(obs),
                None => debug!("dropping extra detected hand, both slots taken"),
            }
        }

        let [left, right] = slots;
        (left.unwrap_or_default(), right.unwrap_or_default())
    }
}

fn slot_index(hand: Hand) -> usize {
    match hand {
        Hand::Left => 0,
        Hand::Right => 1,
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Euclidean distance between two 3D points.
pub fn distance(a: &Point3, b: &Point3) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

// ── Test helpers ───────────────────────────────────────────

/// A plausible flat hand: wrist at `origin`, fingers fanned upwards.
/// `spread` scales the whole hand (roughly the image-space hand size).
#[cfg(test)]
pub(crate) fn test_hand_points(origin: Point3, spread: f32) -> Vec<Point3> {
    (0..LANDMARK_COUNT)
        .map(|i| {
            if i == 0 {
                return origin;
            }
            let finger = ((i - 1) / 4) as f32;
            let joint = ((i - 1) % 4 + 1) as f32;
            [
                origin[0] + spread * (finger - 2.0) * 0.1 * joint * 0.5,
                origin[1] - spread * joint * 0.25,
                origin[2] + spread * 0.01 * joint,
            ]
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_indices() {
        assert_eq!(HandLandmark::Wrist.index(), 0);
        assert_eq!(HandLandmark::MiddleMcp.index(), 9);
        assert_eq!(HandLandmark::PinkyTip.index(), 20);
        assert_eq!(LANDMARK_COUNT, 21);
    }

    #[test]
    fn test_fingertips_and_knuckles() {
        let tips: Vec<usize> = HandLandmark::fingertips().iter().map(|l| l.index()).collect();
        let knuckles: Vec<usize> = HandLandmark::knuckles().iter().map(|l| l.index()).collect();
        assert_eq!(tips, vec![4, 8, 12, 16, 20]);
        assert_eq!(knuckles, vec![2, 5, 9, 13, 17]);
    }

    #[test]
    fn test_landmark_as_str() {
        assert_eq!(HandLandmark::Wrist.as_str(), "wrist");
        assert_eq!(HandLandmark::ThumbTip.as_str(), "thumb-tip");
        assert_eq!(HandLandmark::PinkyTip.as_str(), "pinky-tip");
    }

    #[test]
    fn test_hand_parse() {
        assert_eq!(Hand::parse("left"), Some(Hand::Left));
        assert_eq!(Hand::parse("right"), Some(Hand::Right));
        assert_eq!(Hand::parse("both"), None);
        assert_eq!(Hand::Left.as_str(), "left");
    }

    #[test]
    fn test_observation_wrong_count() {
        assert!(HandObservation::from_points(&[[0.1, 0.2, 0.0]; 10]).is_none());
    }

    #[test]
    fn test_observation_non_finite_zeroed() {
        let mut points = test_hand_points([0.5, 0.5, 0.0], 1.0);
        points[3] = [f32::NAN, f32::INFINITY, 0.2];
        let obs = HandObservation::from_points(&points).unwrap();
        assert!(obs.present);
        assert_eq!(obs.points[3], [0.0, 0.0, 0.2]);
    }

    #[test]
    fn test_observation_all_zero_absent() {
        let obs = HandObservation::from_points(&[[0.0; 3]; LANDMARK_COUNT]).unwrap();
        assert!(!obs.present);
    }

    #[test]
    fn test_flat_round_trip() {
        let obs = HandObservation::from_points(&test_hand_points([0.3, 0.6, 0.0], 1.0)).unwrap();
        let flat = obs.to_flat();
        assert_eq!(flat.len(), FLAT_LEN);
        assert_eq!(HandObservation::from_flat(&flat), Some(obs));
        assert!(HandObservation::from_flat(&flat[..60]).is_none());
    }

    #[test]
    fn test_empty_frame_both_absent() {
        let (left, right) = RawFrame::empty().observations();
        assert!(!left.present);
        assert!(!right.present);
    }

    #[test]
    fn test_labeled_hands_take_their_slots() {
        let frame = RawFrame {
            hands: vec![
                DetectedHand {
                    label: Some(Hand::Right),
                    points: test_hand_points([0.7, 0.5, 0.0], 1.0),
                },
                DetectedHand {
                    label: Some(Hand::Left),
                    points: test_hand_points([0.2, 0.5, 0.0], 1.0),
                },
            ],
        };
        let (left, right) = frame.observations();
        assert_eq!(left.point(HandLandmark::Wrist), [0.2, 0.5, 0.0]);
        assert_eq!(right.point(HandLandmark::Wrist), [0.7, 0.5, 0.0]);
    }

    #[test]
    fn test_unlabeled_first_goes_left() {
        let frame = RawFrame {
            hands: vec![
                DetectedHand {
                    label: None,
                    points: test_hand_points([0.7, 0.5, 0.0], 1.0),
                },
                DetectedHand {
                    label: None,
                    points: test_hand_points([0.2, 0.5, 0.0], 1.0),
                },
            ],
        };
        let (left, right) = frame.observations();
        assert_eq!(left.point(HandLandmark::Wrist), [0.7, 0.5, 0.0]);
        assert_eq!(right.point(HandLandmark::Wrist), [0.2, 0.5, 0.0]);
    }

    #[test]
    fn test_duplicate_label_takes_free_slot() {
        let frame = RawFrame {
            hands: vec![
                DetectedHand {
                    label: Some(Hand::Right),
                    points: test_hand_points([0.7, 0.5, 0.0], 1.0),
                },
                DetectedHand {
                    label: Some(Hand::Right),
                    points: test_hand_points([0.2, 0.5, 0.0], 1.0),
                },
            ],
        };
        let (left, right) = frame.observations();
        assert_eq!(right.point(HandLandmark::Wrist), [0.7, 0.5, 0.0]);
        assert_eq!(left.point(HandLandmark::Wrist), [0.2, 0.5, 0.0]);
    }

    #[test]
    fn test_extra_and_malformed_hands_dropped() {
        let frame = RawFrame {
            hands: vec![
                DetectedHand {
                    label: None,
                    points: vec![[0.1, 0.1, 0.0]; 5],
                },
                DetectedHand {
                    label: None,
                    points: test_hand_points([0.1, 0.5, 0.0], 1.0),
                },
                DetectedHand {
                    label: None,
                    points: test_hand_points([0.5, 0.5, 0.0], 1.0),
                },
                DetectedHand {
                    label: None,
                    points: test_hand_points([0.9, 0.5, 0.0], 1.0),
                },
            ],
        };
        let (left, right) = frame.observations();
        assert_eq!(left.point(HandLandmark::Wrist), [0.1, 0.5, 0.0]);
        assert_eq!(right.point(HandLandmark::Wrist), [0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_distance() {
        assert!((distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]) - 5.0).abs() < 1e-6);
    }
}
