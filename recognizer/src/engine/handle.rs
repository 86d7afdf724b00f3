//! Engine handle: configuration, pose detector, reference store and the
//! current library snapshot. Built once and shared by every stream.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::state::EngineState;
use crate::hand::pose::{FingertipReachDetector, GestureDetector};
use crate::matching::dtw::{self, RecognitionResult};
use crate::matching::library::embed_record;
use crate::matching::{ReferenceLibrary, SequenceModel};
use crate::store::{RecordedSequence, ReferenceStore};

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) detector: Box<dyn GestureDetector>,
    store: Mutex<Box<dyn ReferenceStore>>,
    library: RwLock<Arc<ReferenceLibrary>>,
}

impl Engine {
    /// Validate the config and load the library from `store`.
    pub fn new(config: EngineConfig, store: Box<dyn ReferenceStore>) -> Result<Self, EngineError> {
        config.validate()?;
        let detector = FingertipReachDetector::new(config.open_threshold, config.closed_threshold);
        let engine = Self {
            config,
            detector: Box::new(detector),
            store: Mutex::new(store),
            library: RwLock::new(Arc::new(ReferenceLibrary::default())),
        };
        engine.refresh()?;
        Ok(engine)
    }

    /// Replace the pose classifier used by the gesture trigger.
    pub fn with_detector(mut self, detector: Box<dyn GestureDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fresh per-stream state.
    pub fn new_stream(&self) -> EngineState {
        EngineState::new()
    }

    /// Current library snapshot. Stays valid even if a save swaps in a newer one.
    pub fn library(&self) -> Arc<ReferenceLibrary> {
        self.library
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reload every reference from the store and swap the snapshot.
    pub fn refresh(&self) -> Result<(), EngineError> {
        let records = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .load_all()?;
        let library = ReferenceLibrary::from_records(&records, self.config.embedding);
        info!(
            signs = library.len(),
            examples = library.example_count(),
            "reference library loaded"
        );
        *self.library.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(library);
        Ok(())
    }

    /// Persist one example and make it visible to the next recognition.
    ///
    /// Fails only when the write fails. If the reload after a successful
    /// write fails, the example is added to the current snapshot instead.
    pub fn save(&self, name: &str, sequence: &RecordedSequence) -> Result<String, EngineError> {
        let id = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save(name, sequence)?;
        if let Err(e) = self.refresh() {
            warn!(
                sign = %name,
                id = %id,
                "reload after save failed, adding example in place: {}",
                e
            );
            let model = embed_record(sequence, self.config.embedding);
            let mut guard = self.library.write().unwrap_or_else(PoisonError::into_inner);
            let mut library = (**guard).clone();
            if !model.is_empty() {
                library.insert(name, model);
            }
            *guard = Arc::new(library);
        }
        Ok(id)
    }

    /// Best match for `query`, or `None` when the library is empty.
    pub fn recognize(&self, query: &SequenceModel) -> Option<RecognitionResult> {
        let library = self.library();
        dtw::rank(query, &library, self.config.hand_policy)
            .into_iter()
            .next()
            .map(|(label, distance)| RecognitionResult { label, distance })
    }

    /// Display confidence for a distance: `1 - d / threshold`, clamped to [0, 1].
    pub fn confidence(&self, distance: f32) -> f32 {
        let threshold = self.config.dtw_threshold;
        if !distance.is_finite() {
            return 0.0;
        }
        if threshold <= 0.0 {
            return if distance <= 0.0 { 1.0 } else { 0.0 };
        }
        (1.0 - distance / threshold).clamp(0.0, 1.0)
    }

    /// Sign names in the current library.
    pub fn sign_names(&self) -> Vec<String> {
        self.library().sign_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::{test_hand_points, HandObservation};
    use crate::store::{MemoryStore, StoreError};

    fn record(spread: f32, frames: usize) -> RecordedSequence {
        let flat = HandObservation::from_points(&test_hand_points([0.5, 0.5, 0.0], spread))
            .unwrap()
            .to_flat();
        RecordedSequence {
            left: vec![flat; frames],
            right: vec![vec![0.0; 63]; frames],
        }
    }

    struct BrokenStore;

    impl ReferenceStore for BrokenStore {
        fn load_all(&self) -> Result<crate::store::Records, StoreError> {
            Err(StoreError::Io(std::io::Error::other("unreadable")))
        }

        fn save(&mut self, _: &str, _: &RecordedSequence) -> Result<String, StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig {
            seq_len: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(config, Box::new(MemoryStore::new())),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_new_propagates_store_failure() {
        assert!(matches!(
            Engine::new(EngineConfig::default(), Box::new(BrokenStore)),
            Err(EngineError::Store(_))
        ));
    }

    #[test]
    fn test_save_is_visible_immediately() {
        let engine = Engine::new(EngineConfig::default(), Box::new(MemoryStore::new())).unwrap();
        let before = engine.library();
        assert!(before.is_empty());

        engine.save("HELLO", &record(0.3, 30)).unwrap();
        assert_eq!(engine.sign_names(), vec!["HELLO".to_string()]);
        // The old snapshot is untouched.
        assert!(before.is_empty());
    }

    #[test]
    fn test_recognize_exact_match() {
        let engine = Engine::new(EngineConfig::default(), Box::new(MemoryStore::new())).unwrap();
        engine.save("HELLO", &record(0.3, 30)).unwrap();

        let query = embed_record(&record(0.3, 30), engine.config().embedding);
        let result = engine.recognize(&query).unwrap();
        assert_eq!(result.label, "HELLO");
        assert_eq!(result.distance, 0.0);
        assert!(result.distance <= engine.config().dtw_threshold);
    }

    #[test]
    fn test_recognize_empty_library() {
        let engine = Engine::new(EngineConfig::default(), Box::new(MemoryStore::new())).unwrap();
        let query = embed_record(&record(0.3, 5), engine.config().embedding);
        assert!(engine.recognize(&query).is_none());
    }

    #[test]
    fn test_confidence() {
        let engine = Engine::new(EngineConfig::default(), Box::new(MemoryStore::new())).unwrap();
        let t = engine.config().dtw_threshold;
        assert_eq!(engine.confidence(0.0), 1.0);
        assert!((engine.confidence(t / 2.0) - 0.5).abs() < 1e-6);
        assert_eq!(engine.confidence(t * 3.0), 0.0);
        assert_eq!(engine.confidence(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Engine>();
    }
}
