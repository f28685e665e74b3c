//! gapfill-core — Exercise session engine, normalizer, and scoring.
//!
//! This crate defines the exercise data model, the dataset normalizer, the
//! session state machine with its scoring and progress persistence, and the
//! pure view-model projector that front ends render from.

pub mod chunking;
pub mod error;
pub mod model;
pub mod narration;
pub mod normalizer;
pub mod progress;
pub mod projector;
pub mod scoring;
pub mod session;
pub mod traits;

pub use error::{DatasetError, NarrationError, StorageError, TransitionError};
pub use model::{Dataset, ExerciseFormat, ExerciseSet};
pub use session::{Session, SkillProfile};
