//! TTS module for text-to-speech synthesis using kokoro-tiny.

use kokoro_tiny::TtsEngine;
use std::path::{Path, PathBuf};

use crate::error::ConversationError;

/// Output sample rate of the kokoro model.
pub const SAMPLE_RATE: u32 = 24_000;

/// A rendered utterance, ready to be loaded by an audio engine.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    /// Transient WAV file holding the audio.
    pub path: PathBuf,
    /// Playback length in seconds, when it could be determined.
    pub duration: Option<f64>,
}

/// A speech-synthesis backend.
pub trait Synthesizer {
    /// Render `text` in `voice_id`, sped up or slowed down by `rate`.
    fn synthesize(
        &mut self,
        text: &str,
        voice_id: &str,
        rate: f32,
    ) -> Result<SpeechAudio, ConversationError>;
}

/// Synthesizer backed by the local kokoro model.
pub struct KokoroSynthesizer {
    engine: TtsEngine,
    available_voices: Vec<String>,
    rendered: u64,
}

impl KokoroSynthesizer {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new() -> Result<Self, ConversationError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| ConversationError::Synthesis(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        Ok(Self {
            engine,
            available_voices,
            rendered: 0,
        })
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), ConversationError> {
        if voice_id.is_empty() || !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(ConversationError::UnknownVoice {
                voice: voice_id.to_string(),
                available: format_voice_list(&self.available_voices),
            });
        }

        Ok(())
    }

    fn next_artifact_path(&mut self) -> PathBuf {
        self.rendered += 1;
        std::env::temp_dir().join(format!(
            "convoai-{}-{}.wav",
            std::process::id(),
            self.rendered
        ))
    }
}

impl Synthesizer for KokoroSynthesizer {
    fn synthesize(
        &mut self,
        text: &str,
        voice_id: &str,
        rate: f32,
    ) -> Result<SpeechAudio, ConversationError> {
        self.validate_voice(voice_id)?;

        // Kokoro has a strict limit on input length (~200 chars is safe)
        let mut samples = Vec::new();
        for chunk in split_into_chunks(text, 200) {
            let chunk_samples = self
                .engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| ConversationError::Synthesis(format!("Synthesis failed: {}", e)))?;

            samples.extend(chunk_samples);
            // 0.15s pause between chunks
            samples.extend(std::iter::repeat_n(0.0, SAMPLE_RATE as usize * 15 / 100));
        }

        if samples.is_empty() {
            return Err(ConversationError::Synthesis(
                "Synthesis produced no audio".to_string(),
            ));
        }

        let samples = adjust_audio_speed(samples, rate);
        let path = self.next_artifact_path();
        write_wav(&path, &samples, SAMPLE_RATE)?;

        let duration = match wav_duration(&path) {
            Ok(secs) => Some(secs),
            Err(e) => {
                tracing::debug!(error = %e, "could not read rendered audio length");
                None
            }
        };

        Ok(SpeechAudio { path, duration })
    }
}

/// Format English voices for display.
fn format_voice_list(voices: &[String]) -> String {
    let mut english_voices: Vec<&String> = voices
        .iter()
        .filter(|v| {
            v.starts_with("af_") || v.starts_with("am_") || v.starts_with("bf_") || v.starts_with("bm_")
        })
        .collect();
    english_voices.sort();

    english_voices
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String| {
        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }
        current.clear();
    };

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current.len() + sentence.len() > max_chars {
            flush(&mut current);
        }

        if sentence.len() > max_chars {
            // Long sentence: fall back to comma boundaries
            for part in sentence.split_inclusive(',') {
                if current.len() + part.len() > max_chars {
                    flush(&mut current);
                }
                current.push_str(part.trim());
                current.push(' ');
            }
        } else {
            current.push_str(sentence);
            current.push(' ');
        }
    }
    flush(&mut current);

    chunks
}

/// Adjust audio playback speed using linear interpolation.
/// Rate < 1.0 = slower (e.g., 0.75 = 75% speed), Rate > 1.0 = faster.
pub fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if rate <= 0.0 || (rate - 1.0).abs() < 0.001 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}

/// Write mono samples as a 16-bit PCM WAV file.
fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), ConversationError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let to_err = |e: hound::Error| ConversationError::Synthesis(format!("Failed to write WAV: {}", e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_err)?;
    for &sample in samples {
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(pcm).map_err(to_err)?;
    }
    writer.finalize().map_err(to_err)
}

/// Read the playback length of a WAV file from its header.
pub fn wav_duration(path: &Path) -> Result<f64, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    Ok(reader.duration() as f64 / reader.spec().sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_chunks() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert_eq!(
            chunks,
            vec!["Hello world. This is a test.", "Another sentence here."]
        );
    }

    #[test]
    fn test_split_long_sentence_on_commas() {
        let text = "First clause here, second clause here, third clause here.";
        let chunks = split_into_chunks(text, 25);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.len() <= 25));
    }

    #[test]
    fn test_adjust_audio_speed_faster_is_shorter() {
        let samples: Vec<f32> = (0..1150).map(|i| i as f32).collect();
        let faster = adjust_audio_speed(samples, 1.15);
        assert_eq!(faster.len(), 1000);
        assert_eq!(faster[0], 0.0);
    }

    #[test]
    fn test_adjust_audio_speed_unity_is_noop() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(adjust_audio_speed(samples.clone(), 1.0), samples);
    }

    #[test]
    fn test_wav_roundtrip_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &vec![0.25; SAMPLE_RATE as usize * 3 / 2], SAMPLE_RATE).unwrap();
        let duration = wav_duration(&path).unwrap();
        assert!((duration - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_wav_duration_missing_file() {
        assert!(wav_duration(Path::new("/nonexistent/convoai.wav")).is_err());
    }

    #[test]
    fn test_format_voice_list_filters_and_sorts() {
        let voices = vec![
            "bm_george".to_string(),
            "jf_alpha".to_string(),
            "af_sky".to_string(),
        ];
        assert_eq!(format_voice_list(&voices), "  - af_sky\n  - bm_george");
    }
}
