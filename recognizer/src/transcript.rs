//! Sentence accumulation and announcement de-duplication.
//!
//! Sits between engine events and a voice layer: recognized labels are
//! appended to a sentence unless they repeat the last one, and announcements
//! are rate-limited. An unknown sign is announced once until another label
//! intervenes.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::SignEvent;

/// Something the voice layer should say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Sign(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Spoken {
    Sign(String),
    Unknown,
}

#[derive(Debug)]
pub struct Transcript {
    words: Vec<String>,
    last_spoken: Option<Spoken>,
    last_voice: Option<Instant>,
    voice_cooldown: Duration,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Transcript {
    pub fn new(voice_cooldown: Duration) -> Self {
        Self {
            words: Vec::new(),
            last_spoken: None,
            last_voice: None,
            voice_cooldown,
        }
    }

    /// Feed one engine event. Returns what to announce, if anything.
    pub fn observe(&mut self, event: &SignEvent, now: Instant) -> Option<Announcement> {
        match event {
            SignEvent::Recognized { label, .. } => {
                let spoken = Spoken::Sign(label.clone());
                if self.last_spoken.as_ref() == Some(&spoken) {
                    return None;
                }
                self.words.push(label.clone());
                self.last_spoken = Some(spoken);
                debug!(sentence = %self.sentence(), "transcript extended");

                let ready = self
                    .last_voice
                    .map_or(true, |t| now.saturating_duration_since(t) > self.voice_cooldown);
                if !ready {
                    return None;
                }
                self.last_voice = Some(now);
                Some(Announcement::Sign(label.clone()))
            }
            SignEvent::Unknown { .. } => {
                if self.last_spoken == Some(Spoken::Unknown) {
                    return None;
                }
                self.last_spoken = Some(Spoken::Unknown);
                Some(Announcement::Unknown)
            }
            SignEvent::NoReferences | SignEvent::Saved { .. } => None,
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn sentence(&self) -> String {
        self.words.join(" ")
    }

    /// Empty the sentence.
    pub fn clear(&mut self) {
        self.words.clear();
        self.last_spoken = None;
    }

    /// Forget the last announcement, as on a mode switch.
    pub fn reset(&mut self) {
        self.last_spoken = None;
    }
}

#[cfg(test)]
fn recognized(label: &str) -> SignEvent {
    SignEvent::Recognized {
        label: label.to_string(),
        distance: 1.0,
        confidence: 0.9,
    }
}
