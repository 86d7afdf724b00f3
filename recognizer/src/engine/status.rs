//! Per-frame status, label events and the shared live-result record.

use std::sync::{Arc, Mutex, PoisonError};

use super::state::Mode;
use crate::sexp::{self, bool_sexp, quoted};

/// Label reported when the best match is over the threshold.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Outcome of a capture, as seen by voice/notification layers.
#[derive(Debug, Clone, PartialEq)]
pub enum SignEvent {
    Recognized {
        label: String,
        distance: f32,
        confidence: f32,
    },
    Unknown {
        distance: f32,
    },
    /// Recognition attempted against an empty library.
    NoReferences,
    Saved {
        name: String,
        id: String,
    },
}

impl SignEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Recognized { .. } => "recognized",
            Self::Unknown { .. } => "unknown",
            Self::NoReferences => "no-references",
            Self::Saved { .. } => "saved",
        }
    }

    pub fn to_sexp(&self) -> String {
        match self {
            Self::Recognized {
                label,
                distance,
                confidence,
            } => sexp::format_event(
                self.kind(),
                &[
                    ("label", quoted(label)),
                    ("distance", float_sexp(*distance)),
                    ("confidence", format!("{:.3}", confidence)),
                ],
            ),
            Self::Unknown { distance } => sexp::format_event(
                self.kind(),
                &[
                    ("label", quoted(UNKNOWN_LABEL)),
                    ("distance", float_sexp(*distance)),
                ],
            ),
            Self::NoReferences => sexp::format_event(self.kind(), &[]),
            Self::Saved { name, id } => {
                sexp::format_event(self.kind(), &[("name", quoted(name)), ("id", quoted(id))])
            }
        }
    }
}

/// Finite floats with fixed precision, `nil` otherwise.
fn float_sexp(v: f32) -> String {
    if v.is_finite() {
        format!("{:.3}", v)
    } else {
        "nil".to_string()
    }
}

/// Informational status emitted once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStatus {
    pub hand_visible: bool,
    pub hands_detected: usize,
    pub buffering: bool,
    pub frame_count: usize,
    pub mode: Mode,
    pub label: Option<String>,
    pub distance: Option<f32>,
    pub confidence: Option<f32>,
}

impl FrameStatus {
    pub fn status_sexp(&self) -> String {
        format!(
            "(:hand-visible {} :hands {} :buffering {} :frame-count {} :mode :{} :label {} :distance {} :confidence {})",
            bool_sexp(self.hand_visible),
            self.hands_detected,
            bool_sexp(self.buffering),
            self.frame_count,
            self.mode.as_str(),
            self.label.as_deref().map(quoted).unwrap_or_else(|| "nil".to_string()),
            self.distance.map(float_sexp).unwrap_or_else(|| "nil".to_string()),
            self.confidence
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "nil".to_string()),
        )
    }
}

/// Result of feeding one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub status: FrameStatus,
    /// `None` when nothing completed, or a repeat was suppressed.
    pub event: Option<SignEvent>,
}

// ── Live result ────────────────────────────────────────────

/// Snapshot read by dashboards while a stream keeps running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot {
    pub label: Option<String>,
    pub distance: Option<f32>,
    pub status: String,
    pub last_error: Option<String>,
    pub frames_seen: u64,
    pub hands_detected: usize,
}

/// Shared, lock-protected latest result. Writers replace fields under the
/// lock and readers clone under it, so label and distance always belong to
/// the same pass.
#[derive(Debug, Clone, Default)]
pub struct LiveResult {
    inner: Arc<Mutex<LiveSnapshot>>,
}

impl LiveResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `f` to the snapshot while holding the lock.
    pub fn update(&self, f: impl FnOnce(&mut LiveSnapshot)) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }

    /// Publish one processed frame.
    pub fn record_step(&self, output: &StepOutput, phase: &str, frames_seen: u64) {
        self.update(|s| {
            s.frames_seen = frames_seen;
            s.hands_detected = output.status.hands_detected;
            s.status = match &output.event {
                Some(event) => event.kind().to_string(),
                None => phase.to_string(),
            };
            if output.status.label.is_some() {
                s.label = output.status.label.clone();
                s.distance = output.status.distance;
            }
        });
    }

    pub fn record_error(&self, error: &str) {
        self.update(|s| {
            s.status = "error".to_string();
            s.last_error = Some(error.to_string());
        });
    }

    /// Clear the last label, as on a mode switch.
    pub fn clear_result(&self) {
        self.update(|s| {
            s.label = None;
            s.distance = None;
        });
    }
}
