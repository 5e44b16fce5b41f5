use std::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("no API key configured; set ANTHROPIC_API_KEY")]
    MissingApiKey,
    #[error("request to the synthesis service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("synthesis service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("synthesis service returned no text content")]
    EmptyResponse,
}

/// Turns a rendered prompt into a pre-call plan.
pub trait PlanSynthesizer: Send + Sync + Debug {
    fn synthesize(&self, prompt: &str) -> Result<String, SynthesisError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub endpoint: String,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8000,
            timeout: Duration::from_secs(120),
            endpoint: ANTHROPIC_MESSAGES_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Blocking client for the Anthropic Messages API. Call from a blocking context.
#[derive(Debug)]
pub struct AnthropicSynthesizer {
    settings: AnthropicSettings,
    client: reqwest::blocking::Client,
}

impl AnthropicSynthesizer {
    pub fn new(settings: AnthropicSettings) -> Result<Self, SynthesisError> {
        if settings.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(SynthesisError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &AnthropicSettings {
        &self.settings
    }
}

impl PlanSynthesizer for AnthropicSynthesizer {
    fn synthesize(&self, prompt: &str) -> Result<String, SynthesisError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(SynthesisError::MissingApiKey)?;

        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.settings.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text()?;
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response.json()?;
        let text = extract_text(body);
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }

        info!(
            model = %self.settings.model,
            prompt_chars = prompt.len(),
            plan_chars = text.len(),
            "synthesized pre-call plan"
        );
        Ok(text)
    }
}

fn extract_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("")
}

/// Returns the prompt itself; used for dry runs and offline demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoSynthesizer;

impl PlanSynthesizer for EchoSynthesizer {
    fn synthesize(&self, prompt: &str) -> Result<String, SynthesisError> {
        Ok(prompt.to_string())
    }
}
