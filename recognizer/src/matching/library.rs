//! In-memory reference library: sign name to recorded examples.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::sequence::{Embedding, SequenceModel};
use crate::hand::landmarks::HandObservation;
use crate::hand::normalize::{normalize, NormalizedHand};
use crate::store::RecordedSequence;

/// Sign name to embedded examples, iterated in name order.
///
/// Never mutated while shared: the engine builds a fresh library and swaps
/// the snapshot after every save.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    signs: BTreeMap<String, Vec<SequenceModel>>,
}

impl ReferenceLibrary {
    /// Embed every stored example. Examples with no hand in any frame can
    /// never match and are skipped.
    pub fn from_records(
        records: &BTreeMap<String, Vec<RecordedSequence>>,
        embedding: Embedding,
    ) -> Self {
        let mut library = Self::default();
        for (name, examples) in records {
            for (i, record) in examples.iter().enumerate() {
                let model = embed_record(record, embedding);
                if model.is_empty() {
                    warn!(sign = %name, example = i, "skipping reference with no hand present");
                    continue;
                }
                library.insert(name, model);
            }
        }
        debug!(
            signs = library.len(),
            examples = library.example_count(),
            embedding = embedding.as_str(),
            "built reference library"
        );
        library
    }

    pub fn insert(&mut self, name: &str, model: SequenceModel) {
        self.signs.entry(name.to_string()).or_default().push(model);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SequenceModel])> {
        self.signs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn get(&self, name: &str) -> Option<&[SequenceModel]> {
        self.signs.get(name).map(Vec::as_slice)
    }

    /// Sign names in sorted order.
    pub fn sign_names(&self) -> Vec<String> {
        self.signs.keys().cloned().collect()
    }

    /// Number of distinct signs.
    pub fn len(&self) -> usize {
        self.signs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signs.is_empty()
    }

    /// Total recorded examples across all signs.
    pub fn example_count(&self) -> usize {
        self.signs.values().map(Vec::len).sum()
    }
}

/// Normalize stored raw frames and embed them.
pub fn embed_record(record: &RecordedSequence, embedding: Embedding) -> SequenceModel {
    let left = normalize_frames(&record.left);
    let right = normalize_frames(&record.right);
    SequenceModel::build(&left, &right, embedding)
}

fn normalize_frames(frames: &[Vec<f32>]) -> Vec<NormalizedHand> {
    frames
        .iter()
        .map(|flat| match HandObservation::from_flat(flat) {
            Some(obs) => normalize(&obs),
            None => {
                warn!(len = flat.len(), "stored frame has wrong length, treating as absent");
                NormalizedHand::zero()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::{test_hand_points, FLAT_LEN};

    fn flat_hand(spread: f32) -> Vec<f32> {
        HandObservation::from_points(&test_hand_points([0.4, 0.6, 0.0], spread))
            .unwrap()
            .to_flat()
    }

    fn record(frames: usize) -> RecordedSequence {
        RecordedSequence {
            left: vec![flat_hand(1.0); frames],
            right: vec![vec![0.0; FLAT_LEN]; frames],
        }
    }

    #[test]
    fn test_from_records() {
        let mut records = BTreeMap::new();
        records.insert("HELLO".to_string(), vec![record(10), record(12)]);
        records.insert("BYE".to_string(), vec![record(8)]);

        let library = ReferenceLibrary::from_records(&records, Embedding::Features);
        assert_eq!(library.len(), 2);
        assert_eq!(library.example_count(), 3);
        assert_eq!(library.sign_names(), vec!["BYE".to_string(), "HELLO".to_string()]);

        let hello = library.get("HELLO").unwrap();
        assert!(hello[0].has_left());
        assert!(!hello[0].has_right());
        assert_eq!(hello[1].left().len(), 12);
    }

    #[test]
    fn test_empty_reference_skipped() {
        let mut records = BTreeMap::new();
        records.insert(
            "EMPTY".to_string(),
            vec![RecordedSequence {
                left: vec![vec![0.0; FLAT_LEN]; 4],
                right: Vec::new(),
            }],
        );
        let library = ReferenceLibrary::from_records(&records, Embedding::Landmarks);
        assert!(library.is_empty());
    }

    #[test]
    fn test_wrong_length_frame_is_absent() {
        let rec = RecordedSequence {
            left: vec![vec![0.5; 10], flat_hand(1.0)],
            right: Vec::new(),
        };
        let model = embed_record(&rec, Embedding::Landmarks);
        assert!(model.has_left());
        assert!(model.left().frame(0).iter().all(|&v| v == 0.0));
    }
}
