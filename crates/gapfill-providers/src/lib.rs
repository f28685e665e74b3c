//! gapfill-providers — Dataset sources, narrators, and configuration.
//!
//! Implements the `DatasetSource` trait for local files and HTTP, the
//! `Narrator` trait for the console, and loads `gapfill.toml`.

pub mod config;
pub mod console;
pub mod error;
pub mod file;
pub mod http;
pub mod mock;

pub use config::{
    create_source, load_config_from, DatasetConfig, GapfillConfig, NarrationConfig,
};
pub use error::ProviderError;
