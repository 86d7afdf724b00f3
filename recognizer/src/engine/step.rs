//! Frame-by-frame state machine.
//!
//! `Engine::step` is the only entry point for frames. Commands (`begin_*`,
//! `stop`, `set_mode`) are separate calls on the same `EngineState`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::TriggerMode;
use super::error::EngineError;
use super::handle::Engine;
use super::state::{BufferedFrame, EngineState, LastResult, Mode, Phase};
use super::status::{FrameStatus, SignEvent, StepOutput, UNKNOWN_LABEL};
use crate::hand::landmarks::RawFrame;
use crate::hand::pose::HandPose;
use crate::matching::SequenceModel;
use crate::store;

/// Result of one recognition pass, before stability and cooldown.
enum Outcome {
    Match { label: String, distance: f32 },
    Unknown { distance: f32 },
    NoReferences,
}

impl Engine {
    /// Feed one detector frame.
    ///
    /// Errors only when saving a finished recording fails; the captured
    /// frames stay buffered so the next frame or an explicit stop retries.
    pub fn step(
        &self,
        state: &mut EngineState,
        frame: &RawFrame,
        now: Instant,
    ) -> Result<StepOutput, EngineError> {
        let (left, right) = frame.observations();
        let frame = BufferedFrame::new(left, right);
        let (hand_visible, hands) = (frame.hand_present(), frame.hands_detected());
        state.frames_seen += 1;

        let event = match (state.mode, self.config.trigger) {
            (Mode::Record, _) => self.step_record(state, frame)?,
            (Mode::Recognize, TriggerMode::Continuous) => self.step_window(state, frame, now),
            (Mode::Recognize, _) => self.step_triggered(state, frame, now),
        };

        Ok(StepOutput {
            status: self.frame_status(state, hand_visible, hands),
            event,
        })
    }

    /// Start capturing a new reference for `name`. Requires record mode.
    pub fn begin_recording(&self, state: &mut EngineState, name: &str) -> Result<(), EngineError> {
        let name = name.trim();
        if store::check_name(name).is_err() {
            return Err(EngineError::InvalidName);
        }
        if state.mode != Mode::Record {
            return Err(EngineError::ModeMismatch("recording requires record mode"));
        }
        if let Phase::RecordBuffering { name: previous } = &state.phase {
            debug!(previous = %previous, "restarting recording, discarding {} frames", state.buffer.len());
        }
        state.buffer.clear();
        state.phase = Phase::RecordBuffering {
            name: name.to_string(),
        };
        info!(sign = %name, frames = self.config.seq_len, "recording started");
        Ok(())
    }

    /// Start a recognition capture by command.
    pub fn begin_recognition(&self, state: &mut EngineState) -> Result<(), EngineError> {
        if state.mode != Mode::Recognize {
            return Err(EngineError::ModeMismatch("recognition requires recognize mode"));
        }
        if self.config.trigger == TriggerMode::Continuous {
            return Err(EngineError::ModeMismatch(
                "continuous trigger recognizes without start",
            ));
        }
        state.buffer.clear();
        state.phase = Phase::RecognizeBuffering;
        debug!("recognition capture started");
        Ok(())
    }

    /// Finish the active capture by command: save a recording (possibly
    /// shorter than `seq_len`) or recognize what was buffered.
    pub fn stop(
        &self,
        state: &mut EngineState,
        now: Instant,
    ) -> Result<Option<SignEvent>, EngineError> {
        if state.buffer.is_empty() {
            state.discard_buffer();
            return Err(EngineError::EmptyCapture);
        }
        match state.phase.clone() {
            Phase::RecordBuffering { name } => self.save_buffer(state, &name).map(Some),
            Phase::RecognizeBuffering => Ok(self.finish_recognition(state, now)),
            Phase::Idle if state.mode == Mode::Recognize => {
                // Continuous windows fill while idle.
                Ok(self.finish_recognition(state, now))
            }
            Phase::Idle => {
                state.discard_buffer();
                Err(EngineError::EmptyCapture)
            }
        }
    }

    /// Switch modes. In-flight buffers and stability state are dropped.
    pub fn set_mode(&self, state: &mut EngineState, mode: Mode) {
        if state.mode != mode || state.phase.is_buffering() {
            info!(from = state.mode.as_str(), to = mode.as_str(), "mode switched");
        }
        state.reset(mode);
    }

    // ── Record mode ────────────────────────────────────────

    fn step_record(
        &self,
        state: &mut EngineState,
        frame: BufferedFrame,
    ) -> Result<Option<SignEvent>, EngineError> {
        let Phase::RecordBuffering { name } = state.phase.clone() else {
            return Ok(None);
        };
        if state.buffer.len() < self.config.seq_len {
            state.buffer.push_back(frame);
        }
        if state.buffer.len() < self.config.seq_len {
            return Ok(None);
        }
        self.save_buffer(state, &name).map(Some)
    }

    fn save_buffer(&self, state: &mut EngineState, name: &str) -> Result<SignEvent, EngineError> {
        let sequence = state.recorded_sequence();
        match self.save(name, &sequence) {
            Ok(id) => {
                state.discard_buffer();
                Ok(SignEvent::Saved {
                    name: name.to_string(),
                    id,
                })
            }
            Err(e) => {
                warn!(sign = %name, frames = sequence.frame_count(), "save failed, keeping buffer: {}", e);
                Err(e)
            }
        }
    }

    // ── Recognize mode: command and gesture triggers ───────

    fn step_triggered(
        &self,
        state: &mut EngineState,
        frame: BufferedFrame,
        now: Instant,
    ) -> Option<SignEvent> {
        let gesture = self.config.trigger == TriggerMode::Gesture;

        match state.phase {
            Phase::Idle => {
                if gesture && self.pose_of(&frame) == Some(HandPose::Open) {
                    debug!("open palm, capture started");
                    state.phase = Phase::RecognizeBuffering;
                    state.buffer.push_back(frame);
                }
                None
            }
            Phase::RecognizeBuffering => {
                if !frame.hand_present() {
                    if state.buffer.is_empty() {
                        // Hand not seen yet.
                        return None;
                    }
                    if state.buffer.len() > self.config.min_frames {
                        debug!(frames = state.buffer.len(), "hand lost, capture complete");
                        return self.finish_recognition(state, now);
                    }
                    debug!(frames = state.buffer.len(), "hand lost early, capture discarded");
                    state.discard_buffer();
                    return None;
                }
                if gesture && self.pose_of(&frame) == Some(HandPose::Closed) {
                    debug!(frames = state.buffer.len(), "fist, capture complete");
                    return self.finish_recognition(state, now);
                }
                state.buffer.push_back(frame);
                if state.buffer.len() >= self.config.max_frames {
                    debug!(frames = state.buffer.len(), "frame cap reached");
                    return self.finish_recognition(state, now);
                }
                None
            }
            Phase::RecordBuffering { .. } => None,
        }
    }

    /// Pose of the first present hand.
    fn pose_of(&self, frame: &BufferedFrame) -> Option<HandPose> {
        [&frame.left, &frame.right]
            .into_iter()
            .find(|h| h.present)
            .map(|h| self.detector.classify(h))
    }

    // ── Recognize mode: continuous trigger ─────────────────

    fn step_window(
        &self,
        state: &mut EngineState,
        frame: BufferedFrame,
        now: Instant,
    ) -> Option<SignEvent> {
        if !frame.hand_present() {
            return None;
        }
        state.buffer.push_back(frame);
        while state.buffer.len() > self.config.max_frames {
            state.buffer.pop_front();
        }
        if state.buffer.len() < self.config.window_min_frames {
            return None;
        }
        let outcome = self.classify(state);
        if matches!(outcome, Outcome::NoReferences) {
            state.buffer.clear();
        }
        self.apply_policy(state, outcome, now)
    }

    // ── Matching and policy ────────────────────────────────

    /// Recognize the buffer, then clear it and go idle.
    fn finish_recognition(&self, state: &mut EngineState, now: Instant) -> Option<SignEvent> {
        let outcome = if state.buffer.is_empty() {
            None
        } else {
            Some(self.classify(state))
        };
        state.discard_buffer();
        outcome.and_then(|o| self.apply_policy(state, o, now))
    }

    fn classify(&self, state: &EngineState) -> Outcome {
        let (left, right) = state.normalized_sides();
        let query = SequenceModel::build(&left, &right, self.config.embedding);
        match self.recognize(&query) {
            None => Outcome::NoReferences,
            Some(best) if best.distance <= self.config.dtw_threshold => Outcome::Match {
                label: best.label,
                distance: best.distance,
            },
            Some(best) => Outcome::Unknown {
                distance: best.distance,
            },
        }
    }

    /// Stability window and cooldown. Returns the event to emit, if any.
    fn apply_policy(
        &self,
        state: &mut EngineState,
        outcome: Outcome,
        now: Instant,
    ) -> Option<SignEvent> {
        let (label, distance) = match outcome {
            Outcome::NoReferences => {
                debug!("no reference signs loaded");
                state.last_result = None;
                return Some(SignEvent::NoReferences);
            }
            Outcome::Unknown { distance } => {
                self.push_stability(state, None);
                state.last_result = Some(LastResult {
                    label: UNKNOWN_LABEL.to_string(),
                    distance,
                });
                debug!(distance, "unknown sign");
                return Some(SignEvent::Unknown { distance });
            }
            Outcome::Match { label, distance } => (label, distance),
        };

        state.last_result = Some(LastResult {
            label: label.clone(),
            distance,
        });
        self.push_stability(state, Some(label.clone()));

        let window = self.config.stability_window;
        let stable = state.stability.len() == window
            && state
                .stability
                .iter()
                .all(|s| s.as_deref() == Some(label.as_str()));
        if !stable {
            debug!(sign = %label, "match pending stability");
            return None;
        }

        let cooldown = Duration::try_from_secs_f64(self.config.cooldown_ms / 1000.0)
            .unwrap_or(Duration::MAX);
        if let Some((last, at)) = &state.last_confirmed {
            if *last == label && now.saturating_duration_since(*at) < cooldown {
                debug!(sign = %label, "repeat within cooldown suppressed");
                return None;
            }
        }

        info!(sign = %label, distance, "sign recognized");
        state.last_confirmed = Some((label.clone(), now));
        Some(SignEvent::Recognized {
            confidence: self.confidence(distance),
            label,
            distance,
        })
    }

    fn push_stability(&self, state: &mut EngineState, outcome: Option<String>) {
        state.stability.push_back(outcome);
        while state.stability.len() > self.config.stability_window {
            state.stability.pop_front();
        }
    }

    /// Status tuple for `state`, given what the latest frame showed.
    pub fn frame_status(
        &self,
        state: &EngineState,
        hand_visible: bool,
        hands_detected: usize,
    ) -> FrameStatus {
        let result = state.last_result.as_ref();
        FrameStatus {
            hand_visible,
            hands_detected,
            buffering: state.phase.is_buffering() || !state.buffer.is_empty(),
            frame_count: state.buffer.len(),
            mode: state.mode,
            label: result.map(|r| r.label.clone()),
            distance: result.map(|r| r.distance),
            confidence: result.map(|r| self.confidence(r.distance)),
        }
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
fn test_engine(config: super::config::EngineConfig) -> Engine {
    Engine::new(config, Box::new(crate::store::MemoryStore::new())).unwrap()
}

/// Left hand of size `spread` with every finger pushed sideways by `shift`.
#[cfg(test)]
fn hand_frame(spread: f32, shift: f32) -> RawFrame {
    let mut points = crate::hand::landmarks::test_hand_points([0.5, 0.5, 0.0], spread);
    for p in points.iter_mut().skip(1) {
        p[0] += shift;
    }
    RawFrame::single(Some(crate::hand::Hand::Left), points)
}

/// A short sideways wave.
#[cfg(test)]
fn wave(frames: usize, amplitude: f32) -> Vec<RawFrame> {
    (0..frames)
        .map(|i| hand_frame(0.3, amplitude * i as f32 * 0.002))
        .collect()
}

#[cfg(test)]
fn at(base: Instant, ms: u64) -> Instant {
    base + Duration::from_millis(ms)
}

/// Record `frames` under `name` through the state machine.
#[cfg(test)]
fn record_sign(engine: &Engine, name: &str, frames: &[RawFrame]) {
    let mut state = engine.new_stream();
    engine.set_mode(&mut state, Mode::Record);
    engine.begin_recording(&mut state, name).unwrap();
    let now = Instant::now();
    for frame in frames {
        engine.step(&mut state, frame, now).unwrap();
    }
    if state.frame_count() > 0 {
        engine.stop(&mut state, now).unwrap();
    }
}

/// Feed frames and collect every emitted event.
#[cfg(test)]
fn feed(
    engine: &Engine,
    state: &mut EngineState,
    frames: &[RawFrame],
    now: Instant,
) -> Vec<SignEvent> {
    frames
        .iter()
        .filter_map(|f| engine.step(state, f, now).unwrap().event)
        .collect()
}

// ── Tests ──────────────────────────────────────────────────
