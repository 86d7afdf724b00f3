//! Engine configuration: defaults, validation and the s-expression file form.

use std::path::Path;

use lexpr::Value;
use thiserror::Error;

use crate::matching::{Embedding, HandPolicy};
use crate::sexp;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What starts and stops a recognition capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriggerMode {
    /// Explicit start/stop commands; hand loss and the frame cap also stop.
    #[default]
    Command,
    /// Open palm starts, fist or hand loss stops.
    Gesture,
    /// Sliding window over the most recent hand-present frames.
    Continuous,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Gesture => "gesture",
            Self::Continuous => "continuous",
        }
    }

    pub fn parse(s: &str) -> Option<TriggerMode> {
        match s {
            "command" => Some(Self::Command),
            "gesture" => Some(Self::Gesture),
            "continuous" => Some(Self::Continuous),
            _ => None,
        }
    }
}

/// Recognition engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub trigger: TriggerMode,
    pub embedding: Embedding,
    /// Best distance above this classifies as unknown.
    pub dtw_threshold: f32,
    pub hand_policy: HandPolicy,
    /// Frames captured per recorded reference.
    pub seq_len: usize,
    /// Hand loss completes a capture only with more frames than this.
    pub min_frames: usize,
    /// Recognition capture cap (and sliding window size).
    pub max_frames: usize,
    /// Sliding window fill before the continuous trigger starts matching.
    pub window_min_frames: usize,
    /// Mean fingertip reach above which a hand counts as open.
    pub open_threshold: f32,
    /// Mean fingertip reach below which a hand counts as a fist.
    pub closed_threshold: f32,
    /// Repeat suppression window for the same confirmed label (ms).
    pub cooldown_ms: f64,
    /// Consecutive agreeing outcomes needed to confirm a label.
    pub stability_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerMode::Command,
            embedding: Embedding::Features,
            dtw_threshold: Embedding::Features.default_threshold(),
            hand_policy: HandPolicy::Strict,
            seq_len: 50,
            min_frames: 8,
            max_frames: 50,
            window_min_frames: 20,
            open_threshold: 0.15,
            closed_threshold: 0.10,
            cooldown_ms: 1500.0,
            stability_window: 1,
        }
    }
}

impl EngineConfig {
    /// Switch embedding and adopt its calibrated threshold.
    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = embedding;
        self.dtw_threshold = embedding.default_threshold();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.seq_len == 0 {
            return invalid("seq-len must be positive");
        }
        if self.max_frames == 0 {
            return invalid("max-frames must be positive");
        }
        if self.min_frames >= self.max_frames {
            return invalid("min-frames must be below max-frames");
        }
        if self.window_min_frames == 0 || self.window_min_frames > self.max_frames {
            return invalid("window-min-frames must be in 1..=max-frames");
        }
        if !self.dtw_threshold.is_finite() || self.dtw_threshold < 0.0 {
            return invalid("dtw-threshold must be a non-negative number");
        }
        if !(self.closed_threshold < self.open_threshold) {
            return invalid("closed-threshold must be below open-threshold");
        }
        if !self.cooldown_ms.is_finite() || self.cooldown_ms < 0.0 {
            return invalid("cooldown-ms must be non-negative");
        }
        if self.stability_window == 0 {
            return invalid("stability-window must be positive");
        }
        Ok(())
    }

    /// Parse a config plist. Missing keys keep their defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Self::default().merge(&parse_plist(text)?)
    }

    /// Defaults, then a config file plist, then command-line overrides.
    ///
    /// An embedding override adopts that embedding's threshold unless the
    /// file pins `:dtw-threshold`; a threshold override beats both.
    pub fn layered(
        file: Option<&Path>,
        embedding: Option<Embedding>,
        threshold: Option<f32>,
    ) -> Result<Self, ConfigError> {
        let value = match file {
            Some(path) => Some(parse_plist(&std::fs::read_to_string(path)?)?),
            None => None,
        };
        let mut config = match &value {
            Some(v) => Self::default().merge(v)?,
            None => Self::default(),
        };
        if let Some(embedding) = embedding {
            let pinned = config.dtw_threshold;
            let file_pins = match &value {
                Some(v) => float_field(v, "dtw-threshold")?.is_some(),
                None => false,
            };
            config = config.with_embedding(embedding);
            if file_pins {
                config.dtw_threshold = pinned;
            }
        }
        if let Some(threshold) = threshold {
            config.dtw_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay keys present in `value` onto `self`, then validate.
    pub fn merge(mut self, value: &Value) -> Result<Self, ConfigError> {
        if let Some(s) = sexp::get_keyword(value, "trigger") {
            self.trigger = TriggerMode::parse(&s)
                .ok_or_else(|| ConfigError::Parse(format!("unknown trigger: {}", s)))?;
        }
        if let Some(s) = sexp::get_keyword(value, "embedding") {
            let embedding = Embedding::parse(&s)
                .ok_or_else(|| ConfigError::Parse(format!("unknown embedding: {}", s)))?;
            self = self.with_embedding(embedding);
        }
        if let Some(s) = sexp::get_keyword(value, "hand-policy") {
            self.hand_policy = HandPolicy::parse(&s)
                .ok_or_else(|| ConfigError::Parse(format!("unknown hand policy: {}", s)))?;
        }
        if let Some(v) = float_field(value, "dtw-threshold")? {
            self.dtw_threshold = v as f32;
        }
        if let Some(v) = count_field(value, "seq-len")? {
            self.seq_len = v;
        }
        if let Some(v) = count_field(value, "min-frames")? {
            self.min_frames = v;
        }
        if let Some(v) = count_field(value, "max-frames")? {
            self.max_frames = v;
        }
        if let Some(v) = count_field(value, "window-min-frames")? {
            self.window_min_frames = v;
        }
        if let Some(v) = float_field(value, "open-threshold")? {
            self.open_threshold = v as f32;
        }
        if let Some(v) = float_field(value, "closed-threshold")? {
            self.closed_threshold = v as f32;
        }
        if let Some(v) = float_field(value, "cooldown-ms")? {
            self.cooldown_ms = v;
        }
        if let Some(v) = count_field(value, "stability-window")? {
            self.stability_window = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Generate s-expression for the config, readable by `parse`.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:trigger :{} :embedding :{} :dtw-threshold {:.3} :hand-policy :{} :seq-len {} :min-frames {} :max-frames {} :window-min-frames {} :open-threshold {:.3} :closed-threshold {:.3} :cooldown-ms {:.0} :stability-window {})",
            self.trigger.as_str(),
            self.embedding.as_str(),
            self.dtw_threshold,
            self.hand_policy.as_str(),
            self.seq_len,
            self.min_frames,
            self.max_frames,
            self.window_min_frames,
            self.open_threshold,
            self.closed_threshold,
            self.cooldown_ms,
            self.stability_window,
        )
    }
}

fn parse_plist(text: &str) -> Result<Value, ConfigError> {
    lexpr::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn float_field(value: &Value, key: &str) -> Result<Option<f64>, ConfigError> {
    match sexp::get_value(value, key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConfigError::Parse(format!(":{} must be a number", key))),
    }
}

fn count_field(value: &Value, key: &str) -> Result<Option<usize>, ConfigError> {
    match sexp::get_value(value, key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ConfigError::Parse(format!(":{} must be a non-negative integer", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_embedding_keeps_pinned_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let pinned = dir.path().join("pinned.sexp");
        std::fs::write(&pinned, "(:trigger :gesture :dtw-threshold 40.0)").unwrap();
        let unpinned = dir.path().join("unpinned.sexp");
        std::fs::write(&unpinned, "(:trigger :gesture)").unwrap();

        let landmarks = Some(Embedding::Landmarks);
        let c = EngineConfig::layered(Some(pinned.as_path()), landmarks, None).unwrap();
        assert_eq!(c.embedding, Embedding::Landmarks);
        assert_eq!(c.dtw_threshold, 40.0);
        assert_eq!(c.trigger, TriggerMode::Gesture);

        let c = EngineConfig::layered(Some(unpinned.as_path()), landmarks, None).unwrap();
        assert_eq!(c.dtw_threshold, 60.0);

        let c = EngineConfig::layered(Some(pinned.as_path()), landmarks, Some(12.5)).unwrap();
        assert_eq!(c.dtw_threshold, 12.5);

        let c = EngineConfig::layered(None, None, None).unwrap();
        assert_eq!(c, EngineConfig::default());
        assert!(EngineConfig::layered(None, None, Some(-1.0)).is_err());
    }

    #[test]
    fn test_defaults_valid() {
        let c = EngineConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.trigger, TriggerMode::Command);
        assert_eq!(c.hand_policy, HandPolicy::Strict);
        assert_eq!(c.dtw_threshold, 25.0);
        assert_eq!(c.cooldown_ms, 1500.0);
    }

    #[test]
    fn test_embedding_picks_threshold() {
        let c = EngineConfig::parse("(:embedding :landmarks)").unwrap();
        assert_eq!(c.embedding, Embedding::Landmarks);
        assert_eq!(c.dtw_threshold, 60.0);

        let c = EngineConfig::parse("(:embedding :landmarks :dtw-threshold 12.5)").unwrap();
        assert_eq!(c.dtw_threshold, 12.5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let c = EngineConfig::parse("(:trigger :gesture :seq-len 40)").unwrap();
        assert_eq!(c.trigger, TriggerMode::Gesture);
        assert_eq!(c.seq_len, 40);
        assert_eq!(c.max_frames, 50);
    }

    #[test]
    fn test_config_sexp_round_trips() {
        let mut c = EngineConfig::default().with_embedding(Embedding::Landmarks);
        c.trigger = TriggerMode::Continuous;
        c.hand_policy = HandPolicy::Lenient;
        c.stability_window = 3;
        c.min_frames = 6;
        let back = EngineConfig::parse(&c.config_sexp()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::parse("(:trigger :wave)"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::parse("(:seq-len -3)"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::parse("(:min-frames 60)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::parse("(:open-threshold 0.05)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::parse("(:stability-window 0)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(EngineConfig::parse("((("), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_threshold_allowed() {
        let c = EngineConfig::parse("(:dtw-threshold 0)").unwrap();
        assert_eq!(c.dtw_threshold, 0.0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.sexp");
        std::fs::write(&path, "(:cooldown-ms 500 :hand-policy :lenient)").unwrap();
        let c = EngineConfig::layered(Some(path.as_path()), None, None).unwrap();
        assert_eq!(c.cooldown_ms, 500.0);
        assert_eq!(c.hand_policy, HandPolicy::Lenient);
        assert!(matches!(
            EngineConfig::layered(Some(dir.path().join("missing.sexp").as_path()), None, None),
            Err(ConfigError::Io(_))
        ));
    }
}
