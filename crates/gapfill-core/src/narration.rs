//! Sequential narration with cancellation.
//!
//! Utterances are spoken one at a time with a fixed pause in between. A
//! `NarrationHandle` stops the queue at any point; nothing is resumed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::chunking::{chunk_set, ChunkingStrategy};
use crate::model::{AnswerKey, Blank, BlankRef, ExerciseSet, BLANK_MARKER};
use crate::traits::{Narrator, Utterance, Voice};

const VOICE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Voice and pacing settings for narration.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationSettings {
    /// Voice names tried in order (substring match).
    pub preferred_voices: Vec<String>,
    /// Language tag used when no preferred voice is present.
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    /// Silence between utterances.
    pub pause: Duration,
    /// How long to wait for the voice list before using the default voice.
    pub voice_wait: Duration,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            preferred_voices: ["Kate", "Serena", "Karen", "Victoria"]
                .into_iter()
                .map(String::from)
                .collect(),
            language: "en-GB".to_string(),
            rate: 0.9,
            pitch: 1.0,
            pause: Duration::from_millis(400),
            voice_wait: Duration::from_secs(2),
        }
    }
}

/// Pick a voice: a preferred name, then a language match, then the first voice.
pub fn pick_voice(voices: &[Voice], settings: &NarrationSettings) -> Option<Voice> {
    settings
        .preferred_voices
        .iter()
        .find_map(|name| voices.iter().find(|v| v.name.contains(name.as_str())))
        .or_else(|| {
            voices
                .iter()
                .find(|v| v.lang.eq_ignore_ascii_case(&settings.language))
        })
        .or_else(|| voices.first())
        .cloned()
}

/// Wait (bounded) for the narrator's voice list, then pick a voice.
///
/// Returns `None` when no voice list arrives in time; the narrator's
/// default voice is used then.
pub async fn choose_voice(narrator: &dyn Narrator, settings: &NarrationSettings) -> Option<Voice> {
    let poll = async {
        loop {
            match narrator.voices().await {
                Ok(voices) if !voices.is_empty() => return voices,
                Ok(_) => tokio::time::sleep(VOICE_POLL_INTERVAL).await,
                Err(e) => {
                    warn!(narrator = narrator.name(), error = %e, "failed to list voices");
                    return Vec::new();
                }
            }
        }
    };

    let voices = match tokio::time::timeout(settings.voice_wait, poll).await {
        Ok(voices) => voices,
        Err(_) => {
            debug!(
                narrator = narrator.name(),
                "voice list not ready; using default voice"
            );
            Vec::new()
        }
    };

    let voice = pick_voice(&voices, settings);
    debug!(voice = ?voice.as_ref().map(|v| &v.name), "voice chosen");
    voice
}

/// Stops a running narration.
#[derive(Debug, Clone)]
pub struct NarrationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl NarrationHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NarrationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// An utterance that the narrator reported as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtteranceFailure {
    pub index: usize,
    pub error: String,
}

/// What happened during a narration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NarrationReport {
    pub spoken: usize,
    pub failures: Vec<UtteranceFailure>,
    pub cancelled: bool,
}

/// Speak utterances in order, pausing between them, until done or cancelled.
///
/// A failed utterance is logged and skipped.
#[instrument(skip_all, fields(narrator = narrator.name(), utterances = utterances.len()))]
pub async fn narrate(
    narrator: &dyn Narrator,
    utterances: &[Utterance],
    pause: Duration,
    handle: &NarrationHandle,
) -> NarrationReport {
    let mut report = NarrationReport::default();
    let mut cancel_rx = handle.subscribe();

    for (index, utterance) in utterances.iter().enumerate() {
        if handle.is_cancelled() {
            report.cancelled = true;
            break;
        }

        debug!(index, "utterance started");
        tokio::select! {
            result = narrator.speak(utterance) => match result {
                Ok(()) => {
                    report.spoken += 1;
                    debug!(index, "utterance ended");
                }
                Err(e) => {
                    warn!(index, error = %e, "utterance failed");
                    report.failures.push(UtteranceFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            },
            _ = cancelled(&mut cancel_rx) => {
                narrator.stop().await;
                report.cancelled = true;
                break;
            }
        }

        if index + 1 < utterances.len() {
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancelled(&mut cancel_rx) => {
                    report.cancelled = true;
                    break;
                }
            }
        }
    }

    if report.cancelled {
        debug!(spoken = report.spoken, "narration stopped");
    }
    report
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// The text of a set with every blank filled by its key, one utterance per chunk.
pub fn script_for_set(
    set: &ExerciseSet,
    strategy: ChunkingStrategy,
    settings: &NarrationSettings,
    voice: Option<&Voice>,
) -> Vec<Utterance> {
    chunk_set(set, strategy)
        .iter()
        .map(|chunk| Utterance {
            text: filled_text(set, &chunk.text, &chunk.blanks),
            voice: voice.cloned(),
            rate: settings.rate,
            pitch: settings.pitch,
        })
        .collect()
}

fn filled_text(set: &ExerciseSet, template: &str, refs: &[BlankRef]) -> String {
    let mut refs = refs.iter();
    let mut out = String::with_capacity(template.len());
    for (i, part) in template.split(BLANK_MARKER).enumerate() {
        if i > 0 {
            if let Some(blank) = refs.next().and_then(|at| set.blank(*at)) {
                out.push_str(&spoken_key(set, blank));
            }
        }
        out.push_str(part);
    }
    out
}

fn spoken_key(set: &ExerciseSet, blank: &Blank) -> String {
    match blank.key {
        AnswerKey::Choice(letter) => blank
            .options
            .iter()
            .find(|o| o.letter == letter)
            .map(|o| o.text.clone())
            .unwrap_or_else(|| set.key_text(blank)),
        _ => set.key_text(blank),
    }
}
