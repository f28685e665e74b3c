//! Core trait definitions for dataset sources and narrators.
//!
//! These async traits are implemented by the `gapfill-providers` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, NarrationError};
use crate::model::Dataset;
use crate::normalizer::normalize_str;

// ---------------------------------------------------------------------------
// Dataset source trait
// ---------------------------------------------------------------------------

/// Something that can fetch raw dataset documents.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Human-readable source name (e.g. "file", "http").
    fn name(&self) -> &str;

    /// Whether this source handles the given location.
    fn accepts(&self, location: &str) -> bool;

    /// Fetch the raw JSON text at `location`.
    async fn fetch(&self, location: &str) -> Result<String, DatasetError>;
}

/// Fetch and normalize a dataset.
pub async fn load_dataset(
    source: &dyn DatasetSource,
    location: &str,
) -> Result<Dataset, DatasetError> {
    let raw = source.fetch(location).await?;
    let dataset = normalize_str(&raw, location)?;
    tracing::info!(
        source = source.name(),
        location,
        sets = dataset.len(),
        gaps = dataset.total_gaps(),
        "dataset loaded"
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Narrator trait
// ---------------------------------------------------------------------------

/// A speech backend that reads text aloud.
#[async_trait]
pub trait Narrator: Send + Sync {
    fn name(&self) -> &str;

    /// The voices currently available. May be empty while the backend loads.
    async fn voices(&self) -> Result<Vec<Voice>, NarrationError>;

    /// Speak one utterance, resolving when it has finished.
    async fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError>;

    /// Halt the utterance in progress, if any.
    async fn stop(&self) {}
}

/// A voice offered by a narrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 language tag (e.g. "en-GB").
    pub lang: String,
}

/// One piece of text to speak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    /// `None` uses the narrator's default voice.
    #[serde(default)]
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}
