//! The `gapfill narrate` command.

use std::path::PathBuf;

use anyhow::Result;

use gapfill_core::narration::{choose_voice, narrate, script_for_set, NarrationHandle};
use gapfill_core::progress::ProgressStore;
use gapfill_core::SkillProfile;
use gapfill_providers::console::ConsoleNarrator;
use gapfill_providers::load_config_from;

use super::{open_dataset, set_index};

pub async fn execute(
    dataset: String,
    set: usize,
    force: bool,
    fast: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let (dataset, entry) = open_dataset(&config, &dataset).await?;
    let index = set_index(set, &dataset)?;

    let progress = ProgressStore::for_origin(config.storage(), &dataset.origin).load();
    if !force && !progress.is_locked(index) {
        anyhow::bail!("set {set} has not been submitted yet (use --force to narrate it anyway)");
    }

    let exercise = &dataset.sets[index];
    let chunking = entry
        .chunking
        .unwrap_or_else(|| SkillProfile::for_format(&exercise.format).chunking);
    let settings = config.narration.settings();

    let narrator = ConsoleNarrator::stdout(!fast);
    let voice = choose_voice(&narrator, &settings).await;
    let script = script_for_set(exercise, chunking, &settings, voice.as_ref());

    println!("Narrating: {}", exercise.title);
    if let Some(voice) = &voice {
        println!("Voice: {} ({})", voice.name, voice.lang);
    }

    let handle = NarrationHandle::new();
    let watcher = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let pause = if fast {
        std::time::Duration::ZERO
    } else {
        settings.pause
    };
    let report = narrate(&narrator, &script, pause, &handle).await;

    if report.cancelled {
        println!("\nNarration stopped after {} of {} part(s).", report.spoken, script.len());
    } else {
        println!("\nNarrated {} of {} part(s).", report.spoken, script.len());
    }
    for failure in &report.failures {
        println!("  part {} failed: {}", failure.index + 1, failure.error);
    }

    Ok(())
}
