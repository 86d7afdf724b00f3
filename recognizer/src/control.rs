//! Line-oriented s-expression control protocol for one capture stream.
//!
//! Frames:
//!
//! ```text
//! (:type :frame :t 0.40 :hands ((:label :left :points (x0 y0 z0 ... x20 y20 z20))))
//! ```
//!
//! Commands carry an optional `:id` echoed in the response:
//! `:mode`, `:record`, `:start`, `:stop`, `:status`, `:signs`, `:config`,
//! `:clear-transcript`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lexpr::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::{Engine, EngineState, LiveResult, Mode, SignEvent, StepOutput};
use crate::hand::landmarks::{DetectedHand, Hand, Point3, RawFrame};
use crate::sexp::{self, error_response, get_float, get_int, get_keyword, ok_response, quoted};
use crate::transcript::{Announcement, Transcript};

/// Clock step for frames that carry no timestamp (15 fps).
const DEFAULT_FRAME_INTERVAL: f64 = 1.0 / 15.0;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("malformed s-expression: {0}")]
    Parse(String),
    #[error("missing field :{0}")]
    MissingField(&'static str),
    #[error("unknown message type: {0}")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mode(Mode),
    Record { name: String },
    Start,
    Stop,
    Status,
    Signs,
    Config,
    ClearTranscript,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Frame { t: Option<f64>, frame: RawFrame },
    Command { id: i64, command: Command },
}

// ── Parsing ────────────────────────────────────────────────

pub fn parse_line(line: &str) -> Result<Input, ControlError> {
    let value = lexpr::from_str(line).map_err(|e| ControlError::Parse(e.to_string()))?;
    let msg_type = get_keyword(&value, "type").ok_or(ControlError::MissingField("type"))?;
    let id = get_int(&value, "id").unwrap_or(0);

    let command = match msg_type.as_str() {
        "frame" => {
            return Ok(Input::Frame {
                t: get_float(&value, "t").filter(|t| t.is_finite()),
                frame: parse_hands(&value)?,
            })
        }
        "mode" => {
            let name = get_keyword(&value, "mode").ok_or(ControlError::MissingField("mode"))?;
            let mode = Mode::parse(&name)
                .ok_or_else(|| ControlError::Parse(format!("unknown mode: {}", name)))?;
            Command::Mode(mode)
        }
        "record" => Command::Record {
            name: get_keyword(&value, "name").ok_or(ControlError::MissingField("name"))?,
        },
        "start" => Command::Start,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "signs" => Command::Signs,
        "config" => Command::Config,
        "clear-transcript" => Command::ClearTranscript,
        other => return Err(ControlError::UnknownCommand(other.to_string())),
    };
    Ok(Input::Command { id, command })
}

fn parse_hands(value: &Value) -> Result<RawFrame, ControlError> {
    let Some(hands) = sexp::get_value(value, "hands") else {
        return Ok(RawFrame::empty());
    };
    let mut frame = RawFrame::empty();
    for hand in sexp::list_items(hands) {
        let label = get_keyword(hand, "label").and_then(|l| Hand::parse(&l));
        let points = sexp::get_value(hand, "points").ok_or(ControlError::MissingField("points"))?;
        frame.hands.push(DetectedHand {
            label,
            points: parse_points(points)?,
        });
    }
    Ok(frame)
}

/// Accepts a flat `(x0 y0 z0 x1 ...)` list or a list of `(x y z)` triples.
fn parse_points(value: &Value) -> Result<Vec<Point3>, ControlError> {
    let mut flat = Vec::new();
    for item in sexp::list_items(value) {
        if let Some(n) = item.as_f64() {
            flat.push(n as f32);
        } else {
            let triple = sexp::numbers(item)
                .filter(|t| t.len() == 3)
                .ok_or_else(|| ControlError::Parse("non-numeric landmark".to_string()))?;
            flat.extend(triple);
        }
    }
    if flat.len() % 3 != 0 {
        return Err(ControlError::Parse(format!(
            "{} landmark values is not a whole number of points",
            flat.len()
        )));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

// ── Session ────────────────────────────────────────────────

/// One stream driven by protocol lines: engine state, transcript and the
/// live result record.
pub struct Session {
    engine: Arc<Engine>,
    state: EngineState,
    transcript: Transcript,
    live: LiveResult,
    origin: Instant,
    clock: f64,
    hand_visible: bool,
    hands_detected: usize,
}

impl Session {
    pub fn new(engine: Arc<Engine>) -> Self {
        let state = engine.new_stream();
        Self {
            engine,
            state,
            transcript: Transcript::default(),
            live: LiveResult::new(),
            origin: Instant::now(),
            clock: 0.0,
            hand_visible: false,
            hands_detected: 0,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Handle for concurrent readers.
    pub fn live(&self) -> LiveResult {
        self.live.clone()
    }

    /// Instant for a session clock reading, `None` if it is out of range.
    fn instant_at(&self, clock: f64) -> Option<Instant> {
        Duration::try_from_secs_f64(clock.max(0.0))
            .ok()
            .and_then(|d| self.origin.checked_add(d))
    }

    fn now(&self) -> Instant {
        self.instant_at(self.clock).unwrap_or(self.origin)
    }

    /// Process one input line and return every output line it produces.
    pub fn handle_line(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            return Vec::new();
        }
        match parse_line(line) {
            Ok(Input::Frame { t, frame }) => self.handle_frame(t, &frame),
            Ok(Input::Command { id, command }) => self.handle_command(id, command),
            Err(e) => {
                warn!("rejected control line: {}", e);
                vec![error_response(0, &e.to_string())]
            }
        }
    }

    fn handle_frame(&mut self, t: Option<f64>, frame: &RawFrame) -> Vec<String> {
        let clock = t.unwrap_or(self.clock + DEFAULT_FRAME_INTERVAL);
        let Some(now) = self.instant_at(clock) else {
            warn!(t = clock, "frame timestamp out of range, frame skipped");
            return vec![error_response(0, &format!("frame timestamp out of range: {}", clock))];
        };
        self.clock = clock;
        match self.engine.step(&mut self.state, frame, now) {
            Ok(output) => {
                self.hand_visible = output.status.hand_visible;
                self.hands_detected = output.status.hands_detected;
                self.live
                    .record_step(&output, self.state.phase().as_str(), self.state.frames_seen());
                output
                    .event
                    .map(|e| self.emit(&e, now))
                    .unwrap_or_default()
            }
            Err(e) => {
                self.live.record_error(&e.to_string());
                vec![error_response(0, &e.to_string())]
            }
        }
    }

    fn handle_command(&mut self, id: i64, command: Command) -> Vec<String> {
        debug!(id, ?command, "control command");
        let now = self.now();
        let result = match command {
            Command::Mode(mode) => {
                self.engine.set_mode(&mut self.state, mode);
                self.transcript.reset();
                self.live.clear_result();
                Ok(Vec::new())
            }
            Command::Record { name } => self
                .engine
                .begin_recording(&mut self.state, &name)
                .map(|_| Vec::new()),
            Command::Start => self
                .engine
                .begin_recognition(&mut self.state)
                .map(|_| Vec::new()),
            Command::Stop => self.engine.stop(&mut self.state, now).map(|event| {
                self.publish(event.clone());
                event.map(|e| self.emit(&e, now)).unwrap_or_default()
            }),
            Command::Status => return vec![self.status_response(id)],
            Command::Signs => {
                let names: Vec<String> = self.engine.sign_names().iter().map(|n| quoted(n)).collect();
                return vec![format!(
                    "(:type :response :id {} :status :ok :signs ({}))",
                    id,
                    names.join(" ")
                )];
            }
            Command::Config => {
                return vec![format!(
                    "(:type :response :id {} :status :ok :config {})",
                    id,
                    self.engine.config().config_sexp()
                )]
            }
            Command::ClearTranscript => {
                self.transcript.clear();
                Ok(Vec::new())
            }
        };

        match result {
            Ok(events) => {
                let mut out = vec![ok_response(id)];
                out.extend(events);
                out
            }
            Err(e) => {
                self.live.record_error(&e.to_string());
                vec![error_response(id, &e.to_string())]
            }
        }
    }

    /// Push a command-driven result into the live record.
    fn publish(&self, event: Option<SignEvent>) {
        let output = StepOutput {
            status: self
                .engine
                .frame_status(&self.state, self.hand_visible, self.hands_detected),
            event,
        };
        self.live
            .record_step(&output, self.state.phase().as_str(), self.state.frames_seen());
    }

    /// Event line plus any announcement the transcript produces.
    fn emit(&mut self, event: &SignEvent, now: Instant) -> Vec<String> {
        let mut out = vec![event.to_sexp()];
        if let Some(announcement) = self.transcript.observe(event, now) {
            let text = match announcement {
                Announcement::Sign(label) => label,
                Announcement::Unknown => "Unknown sign".to_string(),
            };
            out.push(sexp::format_event(
                "announce",
                &[
                    ("text", quoted(&text)),
                    ("sentence", quoted(&self.transcript.sentence())),
                ],
            ));
        }
        out
    }

    fn status_response(&self, id: i64) -> String {
        let status = self
            .engine
            .frame_status(&self.state, self.hand_visible, self.hands_detected);
        format!(
            "(:type :response :id {} :status :ok :engine {} :phase :{} :frames-seen {} :sentence {})",
            id,
            status.status_sexp(),
            self.state.phase().as_str(),
            self.state.frames_seen(),
            quoted(&self.transcript.sentence()),
        )
    }
}

#[cfg(test)]
fn frame_line(t: f64, spread: f32) -> String {
    let points = crate::hand::landmarks::test_hand_points([0.5, 0.5, 0.0], spread);
    let flat: Vec<f32> = points.iter().flatten().copied().collect();
    format!(
        "(:type :frame :t {} :hands ((:label :left :points {})))",
        t,
        sexp::number_list(&flat)
    )
}

#[cfg(test)]
fn test_session(config: crate::engine::EngineConfig) -> Session {
    let engine = Engine::new(config, Box::new(crate::store::MemoryStore::new())).unwrap();
    Session::new(Arc::new(engine))
}
