//! Per-stream mutable state.
//!
//! One `EngineState` per capture stream. The engine handle is shared, the
//! state never is: every transition takes `&mut EngineState`.

use std::collections::VecDeque;
use std::time::Instant;

use crate::hand::landmarks::HandObservation;
use crate::hand::normalize::{normalize, NormalizedHand};
use crate::store::RecordedSequence;

/// External mode toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Recognize,
    Record,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recognize => "recognize",
            Self::Record => "record",
        }
    }

    pub fn parse(s: &str) -> Option<Mode> {
        match s {
            "recognize" => Some(Self::Recognize),
            "record" => Some(Self::Record),
            _ => None,
        }
    }
}

/// What the active buffer is for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    RecordBuffering { name: String },
    RecognizeBuffering,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RecordBuffering { .. } => "record-buffering",
            Self::RecognizeBuffering => "recognize-buffering",
        }
    }

    pub fn is_buffering(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// One buffered frame: raw observations (kept for saving) and their
/// normalized form (kept for matching).
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    pub left: HandObservation,
    pub right: HandObservation,
    pub left_norm: NormalizedHand,
    pub right_norm: NormalizedHand,
}

impl BufferedFrame {
    pub fn new(left: HandObservation, right: HandObservation) -> Self {
        Self {
            left_norm: normalize(&left),
            right_norm: normalize(&right),
            left,
            right,
        }
    }

    pub fn hand_present(&self) -> bool {
        self.left.present || self.right.present
    }

    pub fn hands_detected(&self) -> usize {
        usize::from(self.left.present) + usize::from(self.right.present)
    }
}

/// Label and distance of the most recent recognition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LastResult {
    pub label: String,
    pub distance: f32,
}

#[derive(Debug, Default)]
pub struct EngineState {
    pub(crate) mode: Mode,
    pub(crate) phase: Phase,
    pub(crate) buffer: VecDeque<BufferedFrame>,
    /// Recent outcomes; `None` stands for an unknown sign.
    pub(crate) stability: VecDeque<Option<String>>,
    pub(crate) last_confirmed: Option<(String, Instant)>,
    pub(crate) last_result: Option<LastResult>,
    pub(crate) frames_seen: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Frames in the active buffer.
    pub fn frame_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn last_result(&self) -> Option<&LastResult> {
        self.last_result.as_ref()
    }

    pub fn last_confirmed(&self) -> Option<&str> {
        self.last_confirmed.as_ref().map(|(label, _)| label.as_str())
    }

    /// Drop the buffer and go idle. Stability state is kept.
    pub(crate) fn discard_buffer(&mut self) {
        self.buffer.clear();
        self.phase = Phase::Idle;
    }

    /// Forget everything except the lifetime frame counter.
    pub(crate) fn reset(&mut self, mode: Mode) {
        let frames_seen = self.frames_seen;
        *self = Self {
            mode,
            frames_seen,
            ..Self::default()
        };
    }

    /// Raw landmark rows of the buffer, for persistence.
    pub(crate) fn recorded_sequence(&self) -> RecordedSequence {
        RecordedSequence {
            left: self.buffer.iter().map(|f| f.left.to_flat()).collect(),
            right: self.buffer.iter().map(|f| f.right.to_flat()).collect(),
        }
    }

    /// Normalized left and right hands of the buffer, frame by frame.
    pub(crate) fn normalized_sides(&self) -> (Vec<NormalizedHand>, Vec<NormalizedHand>) {
        self.buffer
            .iter()
            .map(|f| (f.left_norm, f.right_norm))
            .unzip()
    }
}
