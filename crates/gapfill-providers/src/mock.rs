//! Mock source and narrator for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use gapfill_core::traits::{DatasetSource, Narrator, Utterance, Voice};
use gapfill_core::{DatasetError, NarrationError};

/// A dataset source serving documents from memory.
pub struct MockSource {
    /// Map of location → raw JSON.
    documents: HashMap<String, String>,
    /// Number of fetches made.
    call_count: AtomicU32,
}

impl MockSource {
    pub fn new(documents: HashMap<String, String>) -> Self {
        Self {
            documents,
            call_count: AtomicU32::new(0),
        }
    }

    /// A source serving one document at one location.
    pub fn with_document(location: &str, json: &str) -> Self {
        Self::new(HashMap::from([(location.to_string(), json.to_string())]))
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DatasetSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn accepts(&self, location: &str) -> bool {
        self.documents.contains_key(location)
    }

    async fn fetch(&self, location: &str) -> Result<String, DatasetError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.documents
            .get(location)
            .cloned()
            .ok_or_else(|| DatasetError::Fetch {
                origin: location.to_string(),
                reason: "not found".into(),
            })
    }
}

/// A narrator that records utterances instead of speaking them.
pub struct MockNarrator {
    voices: Vec<Voice>,
    spoken: Mutex<Vec<Utterance>>,
    /// Utterance texts that fail when spoken.
    failing: Vec<String>,
    stop_count: AtomicU32,
}

impl MockNarrator {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            spoken: Mutex::new(Vec::new()),
            failing: Vec::new(),
            stop_count: AtomicU32::new(0),
        }
    }

    /// Make utterances with this exact text fail.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn voices(&self) -> Result<Vec<Voice>, NarrationError> {
        Ok(self.voices.clone())
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError> {
        if self.failing.contains(&utterance.text) {
            return Err(NarrationError::Utterance(format!(
                "cannot speak '{}'",
                utterance.text
            )));
        }
        self.spoken.lock().unwrap().push(utterance.clone());
        Ok(())
    }

    async fn stop(&self) {
        self.stop_count.fetch_add(1, Ordering::Relaxed);
    }
}
