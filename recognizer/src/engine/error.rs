use thiserror::Error;

use super::config::ConfigError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("sign name must be non-empty and contain no path separators")]
    InvalidName,
    #[error("{0}")]
    ModeMismatch(&'static str),
    #[error("no frames captured")]
    EmptyCapture,
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
