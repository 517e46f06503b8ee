//! Audio playback.
//!
//! The output device is opened once per process by [`RodioEngine::open_default`]
//! and then lent to whoever is narrating.

use std::fs::File;
use std::io::BufReader;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use crate::error::ConversationError;
use crate::tts::SpeechAudio;

/// An audio playback device.
pub trait AudioEngine {
    /// Queue `audio` for playback without starting it.
    fn load(&mut self, audio: &SpeechAudio) -> Result<(), ConversationError>;
    /// Start playing the loaded audio.
    fn play(&mut self) -> Result<(), ConversationError>;
    /// Whether loaded audio is still playing.
    fn is_busy(&self) -> bool;
    /// Stop playback and release the loaded audio.
    fn unload(&mut self);
}

/// Playback through the default output device.
pub struct RodioEngine {
    stream: OutputStream,
    sink: Option<Sink>,
}

impl RodioEngine {
    /// Open the default output device.
    pub fn open_default() -> Result<Self, ConversationError> {
        let stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
            ConversationError::Playback(format!("Failed to open audio output: {}", e))
        })?;

        Ok(Self { stream, sink: None })
    }
}

impl AudioEngine for RodioEngine {
    fn load(&mut self, audio: &SpeechAudio) -> Result<(), ConversationError> {
        self.unload();

        let file = File::open(&audio.path)?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| {
            ConversationError::Playback(format!("Failed to decode audio: {}", e))
        })?;

        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(source);
        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) -> Result<(), ConversationError> {
        match &self.sink {
            Some(sink) => {
                sink.play();
                Ok(())
            }
            None => Err(ConversationError::Playback("No audio loaded".to_string())),
        }
    }

    fn is_busy(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }

    fn unload(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
