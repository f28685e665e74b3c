pub mod init;
pub mod narrate;
pub mod play;
pub mod progress;
pub mod validate;

use anyhow::{Context, Result};

use gapfill_core::traits::load_dataset;
use gapfill_core::Dataset;
use gapfill_providers::{create_source, DatasetConfig, GapfillConfig};

/// Resolve a dataset argument through the config and load it.
pub async fn open_dataset(config: &GapfillConfig, name: &str) -> Result<(Dataset, DatasetConfig)> {
    let entry = config.resolve_dataset(name);
    let source = create_source(&entry.location, config)?;
    let dataset = load_dataset(source.as_ref(), &entry.location)
        .await
        .with_context(|| format!("failed to load dataset '{name}'"))?;
    Ok((dataset, entry))
}

/// Convert a 1-based set number from the command line.
pub fn set_index(set: usize, dataset: &Dataset) -> Result<usize> {
    if set == 0 || set > dataset.len() {
        anyhow::bail!(
            "set {set} does not exist (dataset has {} set(s))",
            dataset.len()
        );
    }
    Ok(set - 1)
}
