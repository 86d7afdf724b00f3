//! Sign-recognition engine.
//!
//! `Engine` is the shared handle (config, pose detector, store, library
//! snapshot). Each capture stream owns an `EngineState` and drives it with
//! `Engine::step` plus the command methods.

pub mod config;
pub mod error;
pub mod handle;
pub mod state;
pub mod status;
mod step;

pub use config::{ConfigError, EngineConfig, TriggerMode};
pub use error::EngineError;
pub use handle::Engine;
pub use state::{EngineState, Mode, Phase};
pub use status::{FrameStatus, LiveResult, LiveSnapshot, SignEvent, StepOutput, UNKNOWN_LABEL};
