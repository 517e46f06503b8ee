//! ConvoAI Core Library
//!
//! Provides the turn-taking orchestration between two AI participants,
//! reply validation and sanitization, topic guidance, and narration with
//! speech synchronized to a text reveal.

pub mod audio;
pub mod config;
pub mod error;
pub mod generation;
pub mod guidance;
pub mod narration;
pub mod orchestrator;
pub mod participant;
pub mod sanitizer;
pub mod tts;
pub mod validator;

pub use audio::{AudioEngine, RodioEngine};
pub use config::{Backend, Config, SamplingConfig, SpeechConfig};
pub use error::ConversationError;
pub use generation::{Generator, OllamaGenerator, OpenAiGenerator};
pub use narration::{Narrator, SpeechSynchronizer, TextNarrator};
pub use orchestrator::{ConversationEvent, TurnOrchestrator, TurnState};
pub use participant::{ConversationHistory, Participant, Utterance};
pub use tts::{KokoroSynthesizer, SpeechAudio, Synthesizer};
