//! Narration: speaking an accepted reply while revealing its text.
//!
//! [`SpeechSynchronizer`] starts playback and then prints the reply one
//! character at a time, paced so the text finishes about when the audio
//! does. Narration never fails the conversation: any error falls back to
//! printing the text with a warning.

use std::fs;
use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::AudioEngine;
use crate::config::SpeechConfig;
use crate::error::ConversationError;
use crate::participant::Participant;
use crate::tts::{SpeechAudio, Synthesizer};

/// Replies shorter than this (trimmed, in characters) are not narrated.
pub const MIN_NARRATION_CHARS: usize = 5;

/// Presents an accepted reply to the audience.
#[async_trait(?Send)]
pub trait Narrator {
    async fn narrate(&mut self, speaker: &Participant, text: &str);
}

/// Estimated speaking time of `text`, in seconds.
pub fn estimate_duration(text: &str, words_per_minute: f64) -> f64 {
    let words = text.split_whitespace().count() as f64;
    words / words_per_minute * 60.0
}

/// Delay between revealed characters so that `chars` characters span `duration` seconds.
pub fn per_character_delay(duration: f64, chars: usize) -> f64 {
    if chars == 0 {
        0.0
    } else {
        duration / chars as f64
    }
}

fn too_short(text: &str) -> bool {
    text.trim().chars().count() < MIN_NARRATION_CHARS
}

/// Narrates with synthesized speech and a paced text reveal.
pub struct SpeechSynchronizer<'a, S, A, W> {
    synthesizer: &'a mut S,
    engine: &'a mut A,
    speech: SpeechConfig,
    out: W,
}

impl<'a, S, A, W> SpeechSynchronizer<'a, S, A, W>
where
    S: Synthesizer,
    A: AudioEngine,
    W: Write,
{
    pub fn new(synthesizer: &'a mut S, engine: &'a mut A, speech: SpeechConfig, out: W) -> Self {
        Self {
            synthesizer,
            engine,
            speech,
            out,
        }
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    async fn speak(&mut self, speaker: &Participant, text: &str) -> Result<(), ConversationError> {
        let audio = self
            .synthesizer
            .synthesize(text, &speaker.voice_id, self.speech.rate)?;

        let result = self.play_synced(&audio, text).await;

        self.engine.unload();
        if let Err(e) = fs::remove_file(&audio.path) {
            tracing::debug!(path = %audio.path.display(), error = %e, "could not remove audio file");
        }

        result
    }

    async fn play_synced(
        &mut self,
        audio: &SpeechAudio,
        text: &str,
    ) -> Result<(), ConversationError> {
        let duration = audio
            .duration
            .unwrap_or_else(|| estimate_duration(text, self.speech.words_per_minute));
        let delay = per_character_delay(duration, text.chars().count());
        let delay = Duration::try_from_secs_f64(delay).unwrap_or_default();
        tracing::debug!(duration, ?delay, "narrating");

        self.engine.load(audio)?;
        self.engine.play()?;

        let mut buf = [0u8; 4];
        for c in text.chars() {
            self.emit(c.encode_utf8(&mut buf));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        self.emit("\n");

        let poll = Duration::from_millis(self.speech.poll_interval_ms.max(1));
        while self.engine.is_busy() {
            tokio::time::sleep(poll).await;
        }

        Ok(())
    }
}

#[async_trait(?Send)]
impl<'a, S, A, W> Narrator for SpeechSynchronizer<'a, S, A, W>
where
    S: Synthesizer,
    A: AudioEngine,
    W: Write,
{
    async fn narrate(&mut self, speaker: &Participant, text: &str) {
        if too_short(text) {
            self.emit(&format!("\n{}: [no response]\n", speaker.name));
            return;
        }

        self.emit(&format!("\n{}: ", speaker.name));

        if let Err(e) = self.speak(speaker, text).await {
            tracing::warn!(speaker = %speaker.name, error = %e, "narration fell back to text");
            self.emit(&format!("{text}\n⚠️ Speech error: {e}\n"));
        }
    }
}

/// Narrates by printing replies straight away, with no audio.
pub struct TextNarrator<W> {
    out: W,
}

impl<W: Write> TextNarrator<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

#[async_trait(?Send)]
impl<W: Write> Narrator for TextNarrator<W> {
    async fn narrate(&mut self, speaker: &Participant, text: &str) {
        let line = if too_short(text) { "[no response]" } else { text };
        let _ = writeln!(self.out, "\n{}: {}", speaker.name, line);
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    struct FakeSynthesizer {
        dir: PathBuf,
        duration: Option<f64>,
        fail: bool,
        requests: Vec<(String, String, f32)>,
    }

    impl FakeSynthesizer {
        fn new(dir: &std::path::Path, duration: Option<f64>) -> Self {
            Self {
                dir: dir.to_path_buf(),
                duration,
                fail: false,
                requests: Vec::new(),
            }
        }
    }

    impl Synthesizer for FakeSynthesizer {
        fn synthesize(
            &mut self,
            text: &str,
            voice_id: &str,
            rate: f32,
        ) -> Result<SpeechAudio, ConversationError> {
            self.requests.push((text.to_string(), voice_id.to_string(), rate));
            if self.fail {
                return Err(ConversationError::Synthesis("engine offline".to_string()));
            }
            let path = self.dir.join(format!("clip-{}.wav", self.requests.len()));
            fs::write(&path, b"RIFF")?;
            Ok(SpeechAudio {
                path,
                duration: self.duration,
            })
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        calls: Vec<&'static str>,
        busy_polls: std::cell::Cell<u32>,
        fail_play: bool,
    }

    impl AudioEngine for FakeEngine {
        fn load(&mut self, _audio: &SpeechAudio) -> Result<(), ConversationError> {
            self.calls.push("load");
            Ok(())
        }

        fn play(&mut self) -> Result<(), ConversationError> {
            self.calls.push("play");
            if self.fail_play {
                return Err(ConversationError::Playback("device busy".to_string()));
            }
            Ok(())
        }

        fn is_busy(&self) -> bool {
            let remaining = self.busy_polls.get();
            if remaining == 0 {
                return false;
            }
            self.busy_polls.set(remaining - 1);
            true
        }

        fn unload(&mut self) {
            self.calls.push("unload");
        }
    }

    fn speaker() -> Participant {
        Participant::new("Alex", "Analyst", "am_adam")
    }

    fn output(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_per_character_delay() {
        let delay = per_character_delay(3.0, 30);
        assert!((delay - 0.1).abs() < 1e-12);
        assert!((delay * 30.0 - 3.0).abs() < 1e-9);
        assert_eq!(per_character_delay(3.0, 0), 0.0);
    }

    #[test]
    fn test_estimate_duration() {
        // 15 words at 150 wpm is six seconds
        let text = "one two three four five six seven eight nine ten a b c d e";
        assert!((estimate_duration(text, 150.0) - 6.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_spans_audio_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = FakeSynthesizer::new(dir.path(), Some(3.0));
        let mut engine = FakeEngine::default();
        let text = "abcdefghijklmnopqrstuvwxyz1234";
        assert_eq!(text.len(), 30);

        let started = tokio::time::Instant::now();
        let mut narrator =
            SpeechSynchronizer::new(&mut synth, &mut engine, SpeechConfig::default(), Vec::new());
        narrator.narrate(&speaker(), text).await;
        let elapsed = started.elapsed().as_secs_f64();
        let out = output(narrator.into_output());

        assert!((elapsed - 3.0).abs() < 0.05, "elapsed {elapsed}");
        assert_eq!(out, format!("\nAlex: {text}\n"));
        assert_eq!(synth.requests, vec![(text.to_string(), "am_adam".to_string(), 1.15)]);
        assert_eq!(engine.calls, vec!["load", "play", "unload"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_playback_and_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = FakeSynthesizer::new(dir.path(), Some(0.0));
        let mut engine = FakeEngine::default();
        engine.busy_polls.set(3);

        let started = tokio::time::Instant::now();
        let mut narrator =
            SpeechSynchronizer::new(&mut synth, &mut engine, SpeechConfig::default(), Vec::new());
        narrator.narrate(&speaker(), "Playback should finish first.").await;
        drop(narrator);

        assert!((started.elapsed().as_secs_f64() - 0.3).abs() < 0.05);
        assert_eq!(engine.busy_polls.get(), 0);
        assert!(!dir.path().join("clip-1.wav").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_duration_uses_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = FakeSynthesizer::new(dir.path(), None);
        let mut engine = FakeEngine::default();
        // 5 words at 150 wpm: two seconds
        let text = "Five words in this line";

        let started = tokio::time::Instant::now();
        let mut narrator =
            SpeechSynchronizer::new(&mut synth, &mut engine, SpeechConfig::default(), Vec::new());
        narrator.narrate(&speaker(), text).await;

        assert!((started.elapsed().as_secs_f64() - 2.0).abs() < 0.05);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_text_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = FakeSynthesizer::new(dir.path(), Some(1.0));
        let mut engine = FakeEngine::default();

        let mut narrator =
            SpeechSynchronizer::new(&mut synth, &mut engine, SpeechConfig::default(), Vec::new());
        narrator.narrate(&speaker(), "  hi  ").await;
        let out = output(narrator.into_output());

        assert_eq!(out, "\nAlex: [no response]\n");
        assert!(synth.requests.is_empty());
        assert!(engine.calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_failure_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = FakeSynthesizer::new(dir.path(), Some(1.0));
        synth.fail = true;
        let mut engine = FakeEngine::default();

        let mut narrator =
            SpeechSynchronizer::new(&mut synth, &mut engine, SpeechConfig::default(), Vec::new());
        narrator.narrate(&speaker(), "The backend is down today.").await;
        let out = output(narrator.into_output());

        assert!(out.starts_with("\nAlex: The backend is down today.\n"));
        assert!(out.contains("Speech error"));
        assert!(out.contains("engine offline"));
        assert!(engine.calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_failure_releases_audio() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = FakeSynthesizer::new(dir.path(), Some(1.0));
        let mut engine = FakeEngine {
            fail_play: true,
            ..Default::default()
        };

        let mut narrator =
            SpeechSynchronizer::new(&mut synth, &mut engine, SpeechConfig::default(), Vec::new());
        narrator.narrate(&speaker(), "No speakers attached.").await;
        let out = output(narrator.into_output());

        assert!(out.contains("No speakers attached.\n⚠️ Speech error: Audio playback error: device busy"));
        assert_eq!(engine.calls, vec!["load", "play", "unload"]);
        assert!(!dir.path().join("clip-1.wav").exists());
    }

    #[tokio::test]
    async fn test_text_narrator() {
        let mut narrator = TextNarrator::new(Vec::new());
        narrator.narrate(&speaker(), "Plain text only.").await;
        narrator.narrate(&speaker(), "").await;
        assert_eq!(
            output(narrator.out),
            "\nAlex: Plain text only.\n\nAlex: [no response]\n"
        );
    }
}
