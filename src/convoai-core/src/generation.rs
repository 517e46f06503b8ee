//! Generation backends and reply cleanup.
//!
//! A [`Generator`] turns a fully built context into raw reply text.
//! [`clean_generation`] then removes the markup models emit despite being
//! told not to.

use std::future::Future;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::config::SamplingConfig;
use crate::error::ConversationError;

/// A language-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate raw reply text for `context`.
    async fn generate(
        &self,
        context: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ConversationError>;
}

/// Build the HTTP client shared by the backends.
fn http_client() -> Result<reqwest::Client, ConversationError> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(ConversationError::from)
}

/// Run `attempt` up to `attempts` times with exponential backoff (1s, 2s, 4s...).
async fn with_retries<T, F, Fut>(attempts: u32, mut attempt: F) -> Result<T, ConversationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConversationError>>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for n in 0..attempts {
        if n > 0 {
            let delay = Duration::from_secs(1 << (n - 1));
            tracing::debug!(attempt = n + 1, ?delay, "retrying generation");
            tokio::time::sleep(delay).await;
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(error = %e, "generation attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ConversationError::Backend("Unknown API error after retries".to_string())
    }))
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Generator backed by a local Ollama server.
pub struct OllamaGenerator {
    client: reqwest::Client,
    host: String,
    model: String,
    retries: u32,
}

impl OllamaGenerator {
    pub fn new(
        host: impl Into<String>,
        model: impl Into<String>,
        retries: u32,
    ) -> Result<Self, ConversationError> {
        Ok(Self {
            client: http_client()?,
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            retries,
        })
    }

    fn request_body(&self, context: &str, sampling: &SamplingConfig) -> serde_json::Value {
        json!({
            "model": self.model,
            "prompt": context,
            "stream": false,
            "options": {
                "temperature": sampling.temperature,
                "top_p": sampling.top_p,
                "num_predict": sampling.max_tokens,
                "num_ctx": sampling.context_window,
                "num_thread": sampling.threads,
            }
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(
        &self,
        context: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ConversationError> {
        let url = format!("{}/api/generate", self.host);
        let body = self.request_body(context, sampling);
        let (client, url, body) = (&self.client, &url, &body);

        with_retries(self.retries, || async move {
            let response = client
                .post(url)
                .json(body)
                .send()
                .await?
                .error_for_status()?
                .json::<OllamaResponse>()
                .await?;
            Ok::<_, ConversationError>(response.response)
        })
        .await
    }
}

/// Generator for any OpenAI-compatible chat completions API.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    retries: u32,
}

impl OpenAiGenerator {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: impl Into<String>,
        retries: u32,
    ) -> Result<Self, ConversationError> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client()?),
            model: model.into(),
            retries,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        context: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ConversationError> {
        // Context window and thread count only apply to local runtimes.
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(sampling.temperature)
            .top_p(sampling.top_p)
            .max_completion_tokens(sampling.max_tokens)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: context.to_string().into(),
                    name: None,
                },
            )])
            .build()?;

        let (client, request) = (&self.client, &request);

        with_retries(self.retries, || async move {
            let response = client.chat().create(request.clone()).await?;
            Ok::<_, ConversationError>(response
                .choices
                .first()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default())
        })
        .await
    }
}

/// Reasoning blocks stripped along with their content.
const REASONING_TAGS: &[&str] = &[
    "thinking",
    "think",
    "reflection",
    "reflect",
    "internal",
    "reasoning",
    "thought",
    "scratchpad",
    "analysis",
];

/// Strip reasoning blocks and stage directions from a raw generation.
///
/// Removes `<think>...</think>` style blocks, leftover tags, `*actions*`,
/// `(tone notes)` and `[stage directions]`, then collapses whitespace.
pub fn clean_generation(raw: &str) -> String {
    let mut result = raw.trim().to_string();

    for tag in REASONING_TAGS {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = Regex::new(&pattern) {
            result = re.replace_all(&result, "").into_owned();
        }
    }

    let directions = [
        r"</?[\w]+[^>]*>",
        r"\*[^*]*\*",
        r"\([^)]*\)",
        r"\[[^\]]*\]",
    ];
    for pattern in directions {
        if let Ok(re) = Regex::new(pattern) {
            result = re.replace_all(&result, "").into_owned();
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
