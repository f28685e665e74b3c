//! Error types for the exercise engine.
//!
//! Dataset errors abort a load. Transition errors are expected user races
//! and are returned to the caller to ignore or surface as a notice. Storage
//! and narration errors are logged and never stop a session.

use thiserror::Error;

/// Errors that can occur while fetching or normalizing a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset could not be fetched (I/O, network, or HTTP status).
    #[error("failed to fetch dataset from {origin}: {reason}")]
    Fetch { origin: String, reason: String },

    /// The document parsed, but is not valid JSON for any dataset shape.
    #[error("dataset is not valid JSON: {0}")]
    InvalidJson(String),

    /// The JSON matches none of the recognized dataset shapes.
    #[error("unrecognized dataset format: {0}")]
    UnrecognizedFormat(String),

    /// A field required by the detected shape is absent or has the wrong type.
    #[error("malformed dataset: set {set_index} is missing `{field}`")]
    MissingField { set_index: usize, field: String },

    /// An item's blank markers do not line up with its answers.
    #[error("malformed dataset: set {set_index} has {markers} blank markers but {gaps} answers")]
    GapCountMismatch {
        set_index: usize,
        markers: usize,
        gaps: usize,
    },

    /// A set contains no items at all.
    #[error("malformed dataset: set {set_index} has no items")]
    EmptySet { set_index: usize },

    /// An answer key points outside its option list or word pool.
    #[error("malformed dataset: set {set_index}: {message}")]
    InvalidKey { set_index: usize, message: String },
}

impl DatasetError {
    /// Returns `true` if the data itself is broken, as opposed to the fetch.
    ///
    /// Malformed datasets cannot be recovered by reloading.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DatasetError::Fetch { .. })
    }

    pub(crate) fn missing(set_index: usize, field: impl Into<String>) -> Self {
        DatasetError::MissingField {
            set_index,
            field: field.into(),
        }
    }
}

/// A user action attempted against a session invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The set already has an attempt record and accepts no further edits.
    /// Holds the set index; shown 1-based.
    #[error("exercise set {} is locked", .0 + 1)]
    Locked(usize),

    /// Submission attempted before every blank was answered.
    #[error("answer all questions first ({answered}/{total})")]
    Incomplete { answered: usize, total: usize },

    /// An item, blank, step, set, option, or word index does not exist.
    #[error("{what} {index} is out of range")]
    OutOfRange { what: &'static str, index: usize },

    /// The value is not one of the blank's option letters.
    #[error("'{0}' is not an option for this question")]
    InvalidOption(String),

    /// A word-bank blank was filled without selecting a pool word first.
    #[error("select a word from this set first")]
    NoSelection,

    /// The pool word is already placed in another blank.
    #[error("word {0} is already used")]
    WordConsumed(usize),

    /// Word-pool actions on a set without a word pool.
    #[error("this exercise set has no word bank")]
    NoWordBank,

    /// Typed answers on a set whose blanks are filled from the word bank.
    #[error("answers in this set are chosen from the word bank")]
    RequiresWordSelection,

    /// The active skill profile cannot run this set's format.
    #[error("skill profile cannot run a {0} set")]
    ProfileMismatch(&'static str),

    /// An action that needs an active set before any set was selected.
    #[error("no exercise set selected")]
    NoActiveSet,

    /// A word move started from a blank that holds no word.
    #[error("question {0} has no word to move")]
    EmptyBlank(usize),
}

/// A persistence write or read failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize progress: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A failure reported by a narrator for a single utterance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    #[error("narration backend unavailable: {0}")]
    Unavailable(String),

    #[error("utterance failed: {0}")]
    Utterance(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_are_not_malformed() {
        let fetch = DatasetError::Fetch {
            origin: "data/set01.json".into(),
            reason: "404".into(),
        };
        assert!(!fetch.is_malformed());
        assert!(DatasetError::UnrecognizedFormat("{}".into()).is_malformed());
        assert!(DatasetError::missing(2, "sentences").is_malformed());
    }

    #[test]
    fn missing_field_names_set_and_field() {
        let err = DatasetError::missing(3, "categories[3].sentences");
        let msg = err.to_string();
        assert!(msg.contains("set 3"));
        assert!(msg.contains("categories[3].sentences"));
    }

    #[test]
    fn incomplete_message_shows_counts() {
        let err = TransitionError::Incomplete {
            answered: 3,
            total: 5,
        };
        assert_eq!(err.to_string(), "answer all questions first (3/5)");
    }
}
