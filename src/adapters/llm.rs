//! Chat-completions adapter with provider failover.
//!
//! Every supported provider speaks the OpenAI-compatible
//! `/chat/completions` protocol. Providers are enabled by their API key
//! and tried in a fixed order; the first non-empty reply wins.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Adapter, AdapterOutput};
use crate::core::GenerationParams;

/// Upper bound on a single provider call
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_MESSAGE: &str =
    "You are a precise JSON-generating assistant. Always return ONLY valid JSON, no markdown or commentary.";

/// Provider table: name, key variable, model override variable, default model, endpoint
const PROVIDERS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "groq",
        "GROQ_API_KEY",
        "GROQ_MODEL",
        "llama-3.3-70b-versatile",
        "https://api.groq.com/openai/v1/chat/completions",
    ),
    (
        "deepseek",
        "DEEPSEEK_API_KEY",
        "DEEPSEEK_MODEL",
        "deepseek-chat",
        "https://api.deepseek.com/chat/completions",
    ),
    (
        "openrouter",
        "OPENROUTER_API_KEY",
        "OPENROUTER_MODEL",
        "meta-llama/llama-3.1-70b-instruct",
        "https://openrouter.ai/api/v1/chat/completions",
    ),
    (
        "gemini",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "gemini-1.5-flash",
        "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
    ),
];

/// One OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    api_key: String,
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Enabled providers, in failover order, from a variable lookup
    pub fn discover(lookup: impl Fn(&str) -> Option<String>) -> Vec<Provider> {
        PROVIDERS
            .iter()
            .filter_map(|(name, key_var, model_var, default_model, endpoint)| {
                let key = lookup(key_var).filter(|k| !k.trim().is_empty())?;
                let model = lookup(model_var)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| default_model.to_string());
                Some(Provider::new(*name, *endpoint, model, key))
            })
            .collect()
    }

    /// Enabled providers from the process environment
    pub fn from_env() -> Vec<Provider> {
        Self::discover(|var| std::env::var(var).ok())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

/// Generation adapter over HTTP
pub struct LlmAdapter {
    providers: Vec<Provider>,
    /// Sampling parameters keyed by action (step key)
    params: BTreeMap<String, GenerationParams>,
    client: reqwest::Client,
}

impl LlmAdapter {
    /// Create an adapter over explicit providers
    pub fn new(providers: Vec<Provider>, params: BTreeMap<String, GenerationParams>) -> Self {
        Self {
            providers,
            params,
            client: reqwest::Client::new(),
        }
    }

    /// Create an adapter over providers configured in the environment
    pub fn from_env(params: BTreeMap<String, GenerationParams>) -> Self {
        Self::new(Provider::from_env(), params)
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    fn params_for(&self, action: &str) -> GenerationParams {
        self.params.get(action).copied().unwrap_or_default()
    }

    async fn call(
        &self,
        provider: &Provider,
        prompt: &str,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<AdapterOutput> {
        let body = ChatRequest {
            model: &provider.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&provider.endpoint)
            .bearer_auth(&provider.api_key)
            .timeout(timeout.min(HTTP_TIMEOUT))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", provider.name))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} returned {}: {}",
                provider.name,
                status,
                text.chars().take(200).collect::<String>()
            );
        }

        let reply: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", provider.name))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .with_context(|| format!("{} returned empty content", provider.name))?;

        Ok(AdapterOutput {
            content,
            tokens_used: reply.usage.and_then(|u| u.total_tokens),
            provider: Some(provider.name.clone()),
        })
    }
}

#[async_trait]
impl Adapter for LlmAdapter {
    fn name(&self) -> &str {
        "llm"
    }

    async fn execute(&self, action: &str, input: &str, timeout: Duration) -> Result<AdapterOutput> {
        if self.providers.is_empty() {
            anyhow::bail!("No generation provider configured");
        }

        let params = self.params_for(action);
        let deadline = Instant::now() + timeout;
        let mut failures = Vec::new();

        for provider in &self.providers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                failures.push(format!("{}: no time left", provider.name));
                break;
            }

            debug!(provider = %provider.name, model = %provider.model, action, "Calling provider");
            match self.call(provider, input, params, remaining).await {
                Ok(output) => {
                    info!(provider = %provider.name, action, tokens = ?output.tokens_used, "Generation succeeded");
                    return Ok(output);
                }
                Err(e) => {
                    warn!(provider = %provider.name, action, error = %e, "Provider failed, trying next");
                    failures.push(format!("{:#}", e));
                }
            }
        }

        anyhow::bail!("All providers failed: {}", failures.join("; "))
    }

    async fn health_check(&self) -> Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!(
                "No generation provider configured (set one of GROQ_API_KEY, DEEPSEEK_API_KEY, OPENROUTER_API_KEY, GEMINI_API_KEY)"
            );
        }
        Ok(())
    }
}
