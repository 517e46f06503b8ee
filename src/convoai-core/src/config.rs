//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConversationError;
use crate::participant::Participant;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub sampling: SamplingConfig,
    pub speech: SpeechConfig,
    pub prompts: PromptsConfig,
    pub participants: Vec<ParticipantConfig>,
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

/// Which generation backend to talk to.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A local Ollama server.
    Ollama,
    /// Any OpenAI-compatible chat completions API.
    OpenAI,
}

/// Generation backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: Backend,
    pub model: String,
    /// Transport attempts per generation call.
    pub retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Ollama,
            model: "gemma3:1b".to_string(),
            retries: 3,
        }
    }
}

/// Sampling settings sent with every generation request.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Context window of the local runtime, in tokens.
    pub context_window: u32,
    /// Parallelism hint for the local runtime.
    pub threads: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            max_tokens: 80,
            context_window: 2048,
            threads: 4,
        }
    }
}

/// Narration settings.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    /// Playback rate multiplier applied to synthesized speech.
    pub rate: f32,
    /// Speaking rate assumed when the audio duration is unknown.
    pub words_per_minute: f64,
    /// How often to check whether playback has finished.
    pub poll_interval_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: 1.15,
            words_per_minute: 150.0,
            poll_interval_ms: 100,
        }
    }
}

/// Prompt templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Appended to every generation context.
    pub reply_instruction: String,
    /// Sent after repeated rejections. `{topic}` is replaced.
    pub rescue_template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            reply_instruction: DEFAULT_REPLY_INSTRUCTION.to_string(),
            rescue_template: DEFAULT_RESCUE_TEMPLATE.to_string(),
        }
    }
}

/// Name and personality of one participant.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantConfig {
    pub name: String,
    pub personality: String,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConversationError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConversationError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, ConversationError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConversationError::Config(format!("Failed to parse config: {}", e)))?;

        if config.participants.len() != 2 {
            return Err(ConversationError::Config(format!(
                "Expected exactly 2 participants, got {}",
                config.participants.len()
            )));
        }

        Ok(config)
    }

    /// Build the two participants with the given voice pair.
    pub fn participants(&self, voices: (&str, &str)) -> [Participant; 2] {
        let voice_ids = [voices.0, voices.1];
        std::array::from_fn(|i| {
            let p = &self.participants[i];
            Participant::new(&p.name, &p.personality, voice_ids[i])
        })
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        generation: GenerationConfig::default(),
        sampling: SamplingConfig::default(),
        speech: SpeechConfig::default(),
        prompts: PromptsConfig::default(),
        participants: vec![
            ParticipantConfig {
                name: "Alex".to_string(),
                personality: DEFAULT_ANALYST_PERSONALITY.to_string(),
            },
            ParticipantConfig {
                name: "Sam".to_string(),
                personality: DEFAULT_CRITIC_PERSONALITY.to_string(),
            },
        ],
    }
}

/// Built-in voice pairs, as (first participant, second participant).
pub const VOICE_PAIRS: [(&str, &str); 4] = [
    ("am_adam", "af_sarah"),
    ("am_michael", "af_nicole"),
    ("am_eric", "af_sky"),
    ("bm_george", "bf_emma"),
];

/// Menu number of the voice pair used when none is chosen.
pub const DEFAULT_VOICE_PAIR: u8 = 1;

/// Voice pair by 1-based menu number, falling back to the first pair.
pub fn voice_pair(choice: usize) -> (&'static str, &'static str) {
    choice
        .checked_sub(1)
        .and_then(|i| VOICE_PAIRS.get(i))
        .copied()
        .unwrap_or(VOICE_PAIRS[0])
}

/// Built-in conversation starters.
pub const SUGGESTED_TOPICS: [&str; 5] = [
    "What do you think about the future of artificial intelligence?",
    "Should humanity colonize Mars? What are the pros and cons?",
    "How has social media impacted society?",
    "What are the most effective solutions to climate change?",
    "How should technology be used in education?",
];

/// Suggested topic by 1-based menu number, falling back to the first.
pub fn suggested_topic(choice: usize) -> &'static str {
    choice
        .checked_sub(1)
        .and_then(|i| SUGGESTED_TOPICS.get(i))
        .copied()
        .unwrap_or(SUGGESTED_TOPICS[0])
}

const DEFAULT_REPLY_INSTRUCTION: &str = "IMPORTANT: Respond conversationally as if talking to a friend. Keep your response to 2-3 sentences maximum. Use natural spoken language - contractions, casual phrases, and a relaxed tone. Share your thoughts briefly. No filler words. No asterisks, actions, or tone descriptions.";

const DEFAULT_RESCUE_TEMPLATE: &str =
    "Back to the original topic - {topic}: What's another angle to consider?";

const DEFAULT_ANALYST_PERSONALITY: &str = "ROLE: Technical Analyst. You provide concise, technical, analytical responses. Focus on specific tools, frameworks, and implementation details. Example: 'Selenium automates browser testing through WebDriver API.' Keep responses factual and precise. No filler words or emotional language.";

const DEFAULT_CRITIC_PERSONALITY: &str = "ROLE: Strategic Critic. You challenge assumptions, identify limitations, and ask probing questions. Focus on business impact, risks, and real-world constraints. Example: 'What about edge cases that current AI models miss?' Be direct and questioning. No filler words or emotional language.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampling() {
        let config = Config::default();
        let sampling = config.sampling;
        assert_eq!(sampling.temperature, 0.8);
        assert_eq!(sampling.top_p, 0.9);
        assert_eq!(sampling.max_tokens, 80);
        assert_eq!(sampling.context_window, 2048);
        assert_eq!(sampling.threads, 4);
        assert_eq!(config.generation.backend, Backend::Ollama);
    }

    #[test]
    fn test_default_config_has_two_participants() {
        let config = default_config();
        let [a, b] = config.participants(voice_pair(1));
        assert_eq!(a.name, "Alex");
        assert_eq!(b.name, "Sam");
        assert!(a.personality.starts_with("ROLE: Technical Analyst"));
        assert!(b.personality.starts_with("ROLE: Strategic Critic"));
        assert_eq!(config.generation.model, "gemma3:1b");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.participants.len(), 2);
        assert_eq!(config.participants[0].name, "Alex");
        assert_eq!(config.speech.rate, 1.15);
        assert!(config.prompts.rescue_template.contains("{topic}"));
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_str(
            r#"
            [generation]
            backend = "openai"
            model = "gpt-4o-mini"

            [sampling]
            temperature = 0.5

            [speech]
            words_per_minute = 120.0
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.backend, Backend::OpenAI);
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.sampling.temperature, 0.5);
        assert_eq!(config.sampling.top_p, 0.9);
        assert_eq!(config.speech.words_per_minute, 120.0);
        assert_eq!(config.speech.poll_interval_ms, 100);
    }

    #[test]
    fn test_custom_participants() {
        let config = Config::from_str(
            r#"
            [[participants]]
            name = "Ada"
            personality = "A mathematician."

            [[participants]]
            name = "Linus"
            personality = "A kernel hacker."
            "#,
        )
        .unwrap();
        let [a, b] = config.participants(("am_adam", "af_sarah"));
        assert_eq!(a.name, "Ada");
        assert_eq!(a.voice_id, "am_adam");
        assert_eq!(b.name, "Linus");
        assert_eq!(b.voice_id, "af_sarah");
    }

    #[test]
    fn test_wrong_participant_count() {
        let result = Config::from_str(
            r#"
            [[participants]]
            name = "Solo"
            personality = "Alone."
            "#,
        );
        assert!(matches!(result, Err(ConversationError::Config(_))));
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_str(include_str!("../../../convoai.example.toml")).unwrap();
        assert_eq!(config.generation.backend, Backend::Ollama);
        assert_eq!(config.sampling, SamplingConfig::default());
        assert_eq!(config.participants[1].name, "Sam");
        assert!(config.prompts.reply_instruction.starts_with("IMPORTANT"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_str("generation = 5").is_err());
    }

    #[test]
    fn test_menu_lookups() {
        assert_eq!(voice_pair(4), ("bm_george", "bf_emma"));
        assert_eq!(voice_pair(0), VOICE_PAIRS[0]);
        assert_eq!(voice_pair(9), VOICE_PAIRS[0]);
        assert_eq!(suggested_topic(2), SUGGESTED_TOPICS[1]);
        assert_eq!(suggested_topic(6), SUGGESTED_TOPICS[0]);
    }
}
