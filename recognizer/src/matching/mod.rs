//! Sequence embedding, DTW matching and the reference library.

pub mod dtw;
pub mod library;
pub mod sequence;

pub use dtw::{rank, HandPolicy, RecognitionResult};
pub use library::ReferenceLibrary;
pub use sequence::{Embedding, SequenceModel};
