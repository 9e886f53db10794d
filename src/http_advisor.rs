//! HTTP-based advisor that calls an OpenAI-compatible chat completions API

use crate::advisor::{AdvisoryReply, RankingAdvisor};
use crate::config::{GptRerankingConfig, PriceTable};
use crate::cost::price_usage;
use crate::prompts::AdvisoryRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

pub struct OpenAiAdvisor {
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    pricing: PriceTable,
    client: reqwest::Client,
}

impl OpenAiAdvisor {
    pub fn new(api_key: Option<String>, settings: &GptRerankingConfig, pricing: PriceTable) -> Self {
        Self {
            base_url: OPENAI_API_URL.to_string(),
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            pricing,
            client: reqwest::Client::new(),
        }
    }

    /// Read the API key from the environment
    pub fn from_env(settings: &GptRerankingConfig, pricing: PriceTable) -> Self {
        Self::new(std::env::var(API_KEY_ENV_VAR).ok(), settings, pricing)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn into_reply(&self, response: ChatResponse) -> Result<AdvisoryReply> {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .context("Chat completion returned no content")?;

        let model = response.model.unwrap_or_else(|| self.model.clone());
        let cost_usd = response
            .usage
            .map(|u| price_usage(&self.pricing, &self.model, u.prompt_tokens, u.completion_tokens));

        Ok(AdvisoryReply {
            text,
            model,
            cost_usd,
        })
    }
}

#[async_trait]
impl RankingAdvisor for OpenAiAdvisor {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn advise(&self, request: &AdvisoryRequest, prompt: &str) -> Result<AdvisoryReply> {
        let api_key = self
            .api_key
            .as_ref()
            .with_context(|| format!("{} not set", API_KEY_ENV_VAR))?;

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .with_context(|| format!("Failed to call chat completions for task {}", request.task.id))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions error ({}): {}", status, error_text);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        let reply = self.into_reply(chat)?;
        tracing::debug!(
            "Advisor replied for task {} using {} (cost {:?})",
            request.task.id,
            reply.model,
            reply.cost_usd
        );
        Ok(reply)
    }
}
