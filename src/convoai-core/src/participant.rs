//! Conversation participants and their memory.
//!
//! Each participant keeps its own copy of the conversation, built from
//! sanitized utterances, and uses the most recent part of it as context.

use serde::{Deserialize, Serialize};

/// Number of most recent utterances included in generation context.
pub const CONTEXT_WINDOW: usize = 6;

/// A stored line of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Utterance {
    /// Who said it.
    pub speaker: String,
    /// What was said, after sanitization.
    pub content: String,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }
}

/// Append-only log of utterances.
///
/// The whole log is kept as a transcript; only the last [`CONTEXT_WINDOW`]
/// entries are ever read back as context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    records: Vec<Utterance>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, utterance: Utterance) {
        self.records.push(utterance);
    }

    /// The most recent utterances, oldest first.
    pub fn recent(&self) -> &[Utterance] {
        let start = self.records.len().saturating_sub(CONTEXT_WINDOW);
        &self.records[start..]
    }

    /// Every stored utterance in insertion order.
    pub fn records(&self) -> &[Utterance] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// An AI participant in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Display name for this participant.
    pub name: String,
    /// Role and personality description handed to the generation backend.
    pub personality: String,
    /// Voice ID for speech synthesis.
    pub voice_id: String,
    history: ConversationHistory,
}

impl Participant {
    /// Create a new participant with the given name, personality, and voice.
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            personality: personality.into(),
            voice_id: voice_id.into(),
            history: ConversationHistory::new(),
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Record an already sanitized utterance.
    pub fn remember(&mut self, utterance: Utterance) {
        self.history.push(utterance);
    }

    /// Forget everything said so far.
    pub fn forget(&mut self) {
        self.history.clear();
    }

    /// Build the generation prompt for replying to `message`.
    pub fn build_context(&self, message: &str, instruction: &str) -> String {
        let mut context = format!("You are {}. {}\n\n", self.name, self.personality);

        let recent = self.history.recent();
        if !recent.is_empty() {
            context.push_str("Conversation so far:\n");
            for utterance in recent {
                context.push_str(&format!("{}: {}\n", utterance.speaker, utterance.content));
            }
        }

        context.push_str(&format!("\nNow respond to: {message}\n"));
        context.push_str(instruction);
        context.push_str(&format!("\n{}:", self.name));
        context
    }
}
