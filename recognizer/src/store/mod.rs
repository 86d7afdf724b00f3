//! Reference sequence persistence.
//!
//! The engine only sees `ReferenceStore`: load everything, save one example.
//! A completed `save` must be visible to the next `load_all`.

pub mod fs;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

pub use fs::FsReferenceStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reference file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("unsafe sign name: {0:?}")]
    UnsafeName(String),
}

/// One recorded example: raw, pre-normalization landmark vectors (63 values
/// each) for the left and right hand slots. Absent hands are all-zero rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedSequence {
    pub left: Vec<Vec<f32>>,
    pub right: Vec<Vec<f32>>,
}

impl RecordedSequence {
    /// Number of captured frames.
    pub fn frame_count(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}

pub type Records = BTreeMap<String, Vec<RecordedSequence>>;

pub trait ReferenceStore: Send {
    /// Every stored example, grouped by sign name.
    fn load_all(&self) -> Result<Records, StoreError>;

    /// Persist one example and return its identifier.
    fn save(&mut self, name: &str, sequence: &RecordedSequence) -> Result<String, StoreError>;
}

/// Reject names that are empty or could escape a storage directory.
pub fn check_name(name: &str) -> Result<(), StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(StoreError::UnsafeName(name.to_string()));
    }
    Ok(())
}

// ── In-memory store ────────────────────────────────────────

/// Store kept entirely in memory. Used for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Records,
    saved: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceStore for MemoryStore {
    fn load_all(&self) -> Result<Records, StoreError> {
        Ok(self.records.clone())
    }

    fn save(&mut self, name: &str, sequence: &RecordedSequence) -> Result<String, StoreError> {
        check_name(name)?;
        self.records
            .entry(name.to_string())
            .or_default()
            .push(sequence.clone());
        self.saved += 1;
        Ok(format!("memory-{}", self.saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name() {
        assert!(check_name("HELLO").is_ok());
        assert!(check_name("thank you").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("   ").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name("a/b").is_err());
        assert!(check_name("a\\b").is_err());
    }

    #[test]
    fn test_memory_store_save_visible() {
        let mut store = MemoryStore::new();
        let seq = RecordedSequence {
            left: vec![vec![0.1; 63]; 3],
            right: vec![vec![0.0; 63]; 3],
        };
        let a = store.save("HELLO", &seq).unwrap();
        let b = store.save("HELLO", &seq).unwrap();
        assert_ne!(a, b);
        let all = store.load_all().unwrap();
        assert_eq!(all["HELLO"].len(), 2);
        assert_eq!(all["HELLO"][0].frame_count(), 3);
    }

    #[test]
    fn test_memory_store_rejects_unsafe_name() {
        let mut store = MemoryStore::new();
        let err = store.save("../x", &RecordedSequence::default()).unwrap_err();
        assert!(matches!(err, StoreError::UnsafeName(_)));
    }
}
