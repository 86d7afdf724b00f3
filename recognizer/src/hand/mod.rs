//! Per-frame hand processing: detector boundary, normalization, features
//! and pose classification.

pub mod features;
pub mod landmarks;
pub mod normalize;
pub mod pose;

pub use landmarks::{DetectedHand, Hand, HandLandmark, HandObservation, RawFrame};
pub use normalize::{normalize, NormalizedHand};
pub use pose::{FingertipReachDetector, GestureDetector, HandPose};
