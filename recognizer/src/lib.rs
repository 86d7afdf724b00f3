//! Sign Recognizer - hand-sign recognition by DTW template matching over
//! hand-landmark sequences.
//!
//! Detector frames go through `hand` (boundary rule, normalization, features,
//! pose), `matching` scores captured sequences against the reference library,
//! and `engine` runs the per-stream capture state machine. `control` drives a
//! stream from s-expression lines.

pub mod control;
pub mod engine;
pub mod hand;
pub mod matching;
pub mod sexp;
pub mod store;
pub mod transcript;
