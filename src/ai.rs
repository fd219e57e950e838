use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AiConfig;

// --- Generator trait ---

/// Prompt plus sampling parameters for one completion.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// An external text-generation call: prompt in, free-form text out.
pub trait TextGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (provider, model_id) = match name {
        "gpt-4o-mini" | "mini" => (ProviderKind::OpenAI, "gpt-4o-mini"),
        "gpt-4o" => (ProviderKind::OpenAI, "gpt-4o"),
        "haiku" | "claude-haiku" => (ProviderKind::Anthropic, "claude-haiku-4-5-20251001"),
        "sonnet" | "claude-sonnet" => (ProviderKind::Anthropic, "claude-sonnet-4-5-20250929"),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: gpt-4o-mini (default), gpt-4o, haiku, sonnet",
                name
            ));
        }
    };
    Ok(ModelSpec {
        provider,
        model_id: model_id.to_string(),
    })
}

pub fn create_provider(spec: &ModelSpec, config: &AiConfig) -> Result<Box<dyn TextGenerator>> {
    match spec.provider {
        ProviderKind::OpenAI => {
            let key = config
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is not set")?;
            Ok(Box::new(OpenAIProvider::new(
                key,
                spec.model_id.clone(),
                config.timeout,
            )?))
        }
        ProviderKind::Anthropic => {
            let key = config
                .anthropic_api_key
                .clone()
                .context("ANTHROPIC_API_KEY is not set")?;
            Ok(Box::new(AnthropicProvider::new(
                key,
                spec.model_id.clone(),
                config.timeout,
            )?))
        }
    }
}

/// The configured generator, or `None` when no usable API key is present and
/// the pipelines should run on their local fallbacks.
pub fn from_config(config: &AiConfig) -> Option<Box<dyn TextGenerator>> {
    let spec = match resolve_model(&config.model) {
        Ok(spec) => spec,
        Err(e) => {
            info!("AI disabled: {}", e);
            return None;
        }
    };
    match create_provider(&spec, config) {
        Ok(provider) => {
            info!("AI analysis enabled with {}", provider.model_name());
            Some(provider)
        }
        Err(e) => {
            info!("AI disabled, using basic analysis: {}", e);
            None
        }
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model_id: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            model_id,
            client,
        })
    }
}

impl TextGenerator for OpenAIProvider {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };
        debug!("Sending {} char prompt to {}", request.prompt.len(), self.model_id);

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model_id: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            model_id,
            client,
        })
    }
}

impl TextGenerator for AnthropicProvider {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens: request.max_tokens,
            // The messages API caps temperature at 1.0.
            temperature: request.temperature.min(1.0),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        let text: String = api_response
            .content
            .into_iter()
            .map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(anyhow!("No content in Anthropic API response"));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
