//! The `gapfill validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use gapfill_core::normalizer::validate_dataset;
use gapfill_providers::load_config_from;

use super::open_dataset;

/// The `.json` files in a directory, sorted by name.
fn dataset_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

pub async fn execute(dataset: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let targets = if Path::new(&dataset).is_dir() {
        dataset_files(Path::new(&dataset))?
    } else {
        vec![dataset]
    };
    if targets.is_empty() {
        anyhow::bail!("no dataset files found");
    }

    let mut total_warnings = 0;
    let mut failed = 0;

    for target in &targets {
        let loaded = match open_dataset(&config, target).await {
            Ok((dataset, _)) => dataset,
            Err(e) => {
                println!("Dataset: {target}");
                println!("  ERROR: {e:#}");
                failed += 1;
                continue;
            }
        };

        println!(
            "Dataset: {} ({} sets, {} gaps)",
            loaded.origin,
            loaded.len(),
            loaded.total_gaps()
        );
        for set in &loaded.sets {
            println!(
                "  [{}] {} ({}, {} gaps)",
                set.id, set.title, set.format, set.gap_count
            );
        }

        let warnings = validate_dataset(&loaded);
        for w in &warnings {
            let prefix = w
                .set_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if failed > 0 {
        anyhow::bail!("{failed} dataset(s) failed to load");
    }
    if total_warnings == 0 {
        println!("All datasets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
