//! Conversation orchestration logic.
//!
//! Drives the turn-taking loop between two participants: generate a reply,
//! validate it, narrate it, record it for both sides, then swap roles.

use std::time::{Duration, Instant};

use crate::config::{PromptsConfig, SamplingConfig};
use crate::error::ConversationError;
use crate::generation::{Generator, clean_generation};
use crate::guidance::{guidance, rescue_prompt};
use crate::narration::Narrator;
use crate::participant::{Participant, Utterance};
use crate::sanitizer::sanitize;
use crate::validator::is_acceptable;

/// Default number of accepted turns per conversation.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Consecutive rejections that trigger a rescue prompt.
const RESCUE_AFTER_REJECTIONS: u32 = 2;

/// Where the orchestrator is in the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Generating,
    Validating,
    Accepted,
    Rejected,
    Narrating,
    RecordingHistory,
    SwitchingRoles,
    Done,
}

/// Callback for conversation events.
pub type ConversationCallback = Box<dyn Fn(ConversationEvent) + Send + Sync>;

/// Events emitted during a conversation.
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    /// The conversation is starting.
    ConversationStart { topic: String },
    /// A scheduled angle replaces the pending message.
    NewAngle { prompt: String },
    /// A participant finished generating a reply.
    Thinking { name: String, elapsed: Duration },
    /// A reply was too short to use.
    Rejected { name: String, consecutive: u32 },
    /// A rescue prompt replaces the pending message.
    Rescue { prompt: String },
    /// An accepted reply was stored.
    TurnRecorded { turn: usize, utterance: Utterance },
    /// The conversation has concluded.
    ConversationEnd,
}

/// Per-conversation state.
#[derive(Debug, Clone)]
struct Session {
    state: TurnState,
    topic: String,
    max_turns: usize,
    turn: usize,
    rejections: u32,
    speaker: usize,
    pending: String,
    candidate: String,
}

impl Session {
    fn new(topic: String, max_turns: usize) -> Self {
        Self {
            state: TurnState::Idle,
            topic,
            max_turns,
            turn: 0,
            rejections: 0,
            speaker: 0,
            pending: String::new(),
            candidate: String::new(),
        }
    }

    fn listener(&self) -> usize {
        1 - self.speaker
    }

    /// Next state once the turn counter may have moved.
    fn continue_or_finish(&self) -> TurnState {
        if self.turn >= self.max_turns {
            TurnState::Done
        } else {
            TurnState::Generating
        }
    }
}

/// Orchestrates the conversation between two AI participants.
pub struct TurnOrchestrator {
    participants: [Participant; 2],
    generator: Box<dyn Generator>,
    sampling: SamplingConfig,
    prompts: PromptsConfig,
    session: Session,
    callback: Option<ConversationCallback>,
}

impl TurnOrchestrator {
    /// Create a new orchestrator. `participants[0]` speaks first.
    pub fn new(
        participants: [Participant; 2],
        generator: Box<dyn Generator>,
        topic: impl Into<String>,
        max_turns: usize,
    ) -> Self {
        Self {
            participants,
            generator,
            sampling: SamplingConfig::default(),
            prompts: PromptsConfig::default(),
            session: Session::new(topic.into(), max_turns),
            callback: None,
        }
    }

    /// Override the sampling settings.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Override the prompt templates.
    pub fn with_prompts(mut self, prompts: PromptsConfig) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set a callback for conversation events.
    pub fn with_callback(mut self, callback: ConversationCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Return to `Idle` for a fresh conversation with the same participants.
    pub fn restart(&mut self, topic: impl Into<String>, max_turns: usize) {
        for participant in &mut self.participants {
            participant.forget();
        }
        self.session = Session::new(topic.into(), max_turns);
    }

    /// Run the conversation until the turn budget is spent.
    ///
    /// Returns the full transcript. Only unrecoverable backend failures are
    /// returned as errors; rejected replies and narration problems are
    /// handled inside the loop.
    pub async fn run(
        &mut self,
        narrator: &mut dyn Narrator,
    ) -> Result<Vec<Utterance>, ConversationError> {
        loop {
            let next = self.step(narrator).await?;
            tracing::trace!(from = ?self.session.state, to = ?next, "turn state");
            self.session.state = next;

            if next == TurnState::Done {
                self.emit_event(ConversationEvent::ConversationEnd);
                return Ok(self.transcript().to_vec());
            }
        }
    }

    /// Perform the work of the current state and return the next one.
    async fn step(&mut self, narrator: &mut dyn Narrator) -> Result<TurnState, ConversationError> {
        let next = match self.session.state {
            TurnState::Idle => {
                self.session.pending = self.session.topic.clone();
                self.emit_event(ConversationEvent::ConversationStart {
                    topic: self.session.topic.clone(),
                });
                self.session.continue_or_finish()
            }
            TurnState::Generating => {
                if self.session.turn > 0 {
                    if let Some(angle) = guidance(self.session.turn, &self.session.topic) {
                        self.emit_event(ConversationEvent::NewAngle {
                            prompt: angle.clone(),
                        });
                        self.session.pending = angle;
                    }
                }
                self.session.candidate = self.generate().await?;
                TurnState::Validating
            }
            TurnState::Validating => {
                if is_acceptable(&self.session.candidate) {
                    TurnState::Accepted
                } else {
                    TurnState::Rejected
                }
            }
            TurnState::Rejected => self.reject(),
            TurnState::Accepted => {
                self.session.rejections = 0;
                TurnState::Narrating
            }
            TurnState::Narrating => {
                let speaker = &self.participants[self.session.speaker];
                narrator.narrate(speaker, &self.session.candidate).await;
                TurnState::RecordingHistory
            }
            TurnState::RecordingHistory => {
                let utterance = Utterance::new(
                    self.participants[self.session.speaker].name.clone(),
                    sanitize(&self.session.candidate),
                );
                for participant in &mut self.participants {
                    participant.remember(utterance.clone());
                }
                self.emit_event(ConversationEvent::TurnRecorded {
                    turn: self.session.turn,
                    utterance,
                });
                TurnState::SwitchingRoles
            }
            TurnState::SwitchingRoles => {
                self.session.speaker = self.session.listener();
                self.session.pending = std::mem::take(&mut self.session.candidate);
                self.session.turn += 1;
                self.session.continue_or_finish()
            }
            TurnState::Done => TurnState::Done,
        };

        Ok(next)
    }

    /// Apply the retry policy to a rejected reply.
    ///
    /// The first rejection still consumes a turn; the second injects a rescue
    /// prompt without consuming one.
    fn reject(&mut self) -> TurnState {
        self.session.rejections += 1;
        self.emit_event(ConversationEvent::Rejected {
            name: self.participants[self.session.speaker].name.clone(),
            consecutive: self.session.rejections,
        });

        if self.session.rejections >= RESCUE_AFTER_REJECTIONS {
            let prompt = rescue_prompt(&self.prompts.rescue_template, &self.session.topic);
            self.emit_event(ConversationEvent::Rescue {
                prompt: prompt.clone(),
            });
            self.session.pending = prompt;
            self.session.rejections = 0;
            return TurnState::Generating;
        }

        self.session.turn += 1;
        self.session.continue_or_finish()
    }

    /// Ask the current speaker for a cleaned reply to the pending message.
    async fn generate(&self) -> Result<String, ConversationError> {
        let speaker = &self.participants[self.session.speaker];
        let context = speaker.build_context(&self.session.pending, &self.prompts.reply_instruction);

        let started = Instant::now();
        let raw = self.generator.generate(&context, &self.sampling).await?;
        let elapsed = started.elapsed();
        tracing::debug!(speaker = %speaker.name, ?elapsed, raw_len = raw.len(), "generated reply");

        self.emit_event(ConversationEvent::Thinking {
            name: speaker.name.clone(),
            elapsed,
        });

        Ok(clean_generation(&raw))
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: ConversationEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    /// Current state of the turn loop.
    pub fn state(&self) -> TurnState {
        self.session.state
    }

    /// Turns consumed so far.
    pub fn turn(&self) -> usize {
        self.session.turn
    }

    /// Rejections since the last accepted or rescued reply.
    pub fn consecutive_rejections(&self) -> u32 {
        self.session.rejections
    }

    /// The topic the conversation started from.
    pub fn topic(&self) -> &str {
        &self.session.topic
    }

    /// Get the full transcript.
    pub fn transcript(&self) -> &[Utterance] {
        self.participants[0].history().records()
    }

    /// Get participants.
    pub fn participants(&self) -> &[Participant; 2] {
        &self.participants
    }
}
