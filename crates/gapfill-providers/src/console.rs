//! Console narrator: prints utterances instead of synthesizing speech.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use gapfill_core::traits::{Narrator, Utterance, Voice};
use gapfill_core::NarrationError;

/// Speaking speed at `rate = 1.0`.
const WORDS_PER_MINUTE: f32 = 160.0;

/// Writes each utterance as a line and holds for its estimated speaking time.
pub struct ConsoleNarrator {
    out: Mutex<Box<dyn Write + Send>>,
    paced: bool,
}

impl ConsoleNarrator {
    /// Narrate to stdout, holding each line for its speaking time when `paced`.
    pub fn stdout(paced: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), paced)
    }

    pub fn new(out: Box<dyn Write + Send>, paced: bool) -> Self {
        Self {
            out: Mutex::new(out),
            paced,
        }
    }

    /// How long `text` takes to say at `rate`.
    pub fn speaking_time(text: &str, rate: f32) -> Duration {
        let words = text.split_whitespace().count() as f32;
        let rate = if rate > 0.0 { rate } else { 1.0 };
        Duration::from_secs_f32(words * 60.0 / (WORDS_PER_MINUTE * rate))
    }
}

#[async_trait]
impl Narrator for ConsoleNarrator {
    fn name(&self) -> &str {
        "console"
    }

    async fn voices(&self) -> Result<Vec<Voice>, NarrationError> {
        Ok(vec![Voice {
            name: "Console".to_string(),
            lang: "en-GB".to_string(),
        }])
    }

    #[instrument(skip_all, fields(chars = utterance.text.len()))]
    async fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError> {
        {
            let mut out = self
                .out
                .lock()
                .map_err(|_| NarrationError::Unavailable("console output lock poisoned".into()))?;
            writeln!(out, "  » {}", utterance.text)
                .and_then(|()| out.flush())
                .map_err(|e| NarrationError::Utterance(e.to_string()))?;
        }

        if self.paced {
            tokio::time::sleep(Self::speaking_time(&utterance.text, utterance.rate)).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// A writer that appends into a shared buffer.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_each_utterance() {
        let buf = Shared::default();
        let narrator = ConsoleNarrator::new(Box::new(buf.clone()), false);
        for text in ["First line.", "Second line."] {
            narrator
                .speak(&Utterance {
                    text: text.into(),
                    voice: None,
                    rate: 0.9,
                    pitch: 1.0,
                })
                .await
                .unwrap();
        }
        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "  » First line.\n  » Second line.\n");
    }

    #[test]
    fn slower_rate_takes_longer() {
        let text = "one two three four five six seven eight";
        assert!(
            ConsoleNarrator::speaking_time(text, 0.9) > ConsoleNarrator::speaking_time(text, 1.0)
        );
        assert_eq!(ConsoleNarrator::speaking_time("", 1.0), Duration::ZERO);
    }
}
