//! Error types for the conversation system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("OpenAI API error: {0}")]
    Generation(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation backend error: {0}")]
    Backend(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown voice '{voice}'. Available voices:\n{available}")]
    UnknownVoice { voice: String, available: String },
}
