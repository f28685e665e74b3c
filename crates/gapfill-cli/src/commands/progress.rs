//! The `gapfill progress` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Serialize;

use gapfill_core::progress::{ProgressStore, ProgressSummary, NAMESPACE_PREFIX};
use gapfill_core::scoring::AttemptRecord;
use gapfill_providers::{load_config_from, GapfillConfig};

use super::open_dataset;

#[derive(Serialize)]
struct SetRow<'a> {
    set: usize,
    id: &'a str,
    title: &'a str,
    record: Option<&'a AttemptRecord>,
}

#[derive(Serialize)]
struct DatasetReport<'a> {
    origin: &'a str,
    namespace: &'a str,
    sets: Vec<SetRow<'a>>,
    summary: ProgressSummary,
}

pub async fn execute(
    dataset: Option<String>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    if format != "text" && format != "json" {
        anyhow::bail!("unknown format '{format}' (expected text or json)");
    }
    let config = load_config_from(config_path.as_deref())?;

    match dataset {
        Some(name) => show_dataset(&config, &name, &format).await,
        None => list_namespaces(&config, &format),
    }
}

async fn show_dataset(config: &GapfillConfig, name: &str, format: &str) -> Result<()> {
    let (dataset, _) = open_dataset(config, name).await?;
    let store = ProgressStore::for_origin(config.storage(), &dataset.origin);
    let progress = store.load();

    let report = DatasetReport {
        origin: &dataset.origin,
        namespace: store.namespace(),
        sets: dataset
            .sets
            .iter()
            .enumerate()
            .map(|(i, set)| SetRow {
                set: i + 1,
                id: &set.id,
                title: &set.title,
                record: progress.get(i),
            })
            .collect(),
        summary: progress.summary(dataset.len()),
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Set", "Title", "Score", "%", "Tier", "Submitted"]);
    for row in &report.sets {
        match row.record {
            Some(r) => table.add_row(vec![
                Cell::new(row.set),
                Cell::new(row.title),
                Cell::new(format!("{}/{}", r.correct, r.total)),
                Cell::new(format!("{}%", r.percentage)),
                Cell::new(r.tier()),
                Cell::new(r.timestamp.format("%Y-%m-%d %H:%M")),
            ]),
            None => table.add_row(vec![
                Cell::new(row.set),
                Cell::new(row.title),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("not attempted"),
                Cell::new("-"),
            ]),
        };
    }

    let s = &report.summary;
    println!("Dataset: {} ({})", report.origin, report.namespace);
    println!("{table}");
    println!(
        "Completed {}/{} sets, {} perfect, {}/{} correct, average {:.1}%",
        s.completed, s.set_count, s.perfect, s.correct, s.total, s.average_percentage
    );
    Ok(())
}

fn list_namespaces(config: &GapfillConfig, format: &str) -> Result<()> {
    let backend = config.storage();
    let keys: Vec<String> = backend
        .keys()
        .context("failed to list stored progress")?
        .into_iter()
        .filter(|k| k.starts_with(NAMESPACE_PREFIX))
        .collect();

    let summaries: Vec<(String, ProgressSummary)> = keys
        .into_iter()
        .map(|key| {
            let progress = ProgressStore::new(backend.clone(), key.clone()).load();
            let summary = progress.summary(progress.iter().map(|(i, _)| i + 1).max().unwrap_or(0));
            (key, summary)
        })
        .collect();

    if format == "json" {
        let map: serde_json::Map<String, serde_json::Value> = summaries
            .into_iter()
            .map(|(key, s)| Ok((key, serde_json::to_value(s)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No progress stored in {}", config.storage_dir.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Dataset", "Completed", "Perfect", "Correct", "Average"]);
    for (key, s) in &summaries {
        table.add_row(vec![
            Cell::new(key.trim_start_matches(NAMESPACE_PREFIX)),
            Cell::new(s.completed),
            Cell::new(s.perfect),
            Cell::new(format!("{}/{}", s.correct, s.total)),
            Cell::new(format!("{:.1}%", s.average_percentage)),
        ]);
    }
    println!("{table}");
    Ok(())
}
