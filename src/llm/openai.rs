use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

use super::{GenerationParams, Llm};
use crate::config::LlmConfig;

/// Chat-completions client for any OpenAI-compatible server (vLLM, TGI, ...).
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    limiter: DefaultDirectRateLimiter,
}

impl LlmClient {
    pub fn new(
        model: String,
        base_url: Option<String>,
        api_key: Option<String>,
        qps: u32,
        timeout_ms: u64,
    ) -> Result<Self> {
        let client = build_client(base_url, api_key, timeout_ms)?;
        let qps = NonZeroU32::new(qps).ok_or_else(|| anyhow!("requests per second must be non-zero"))?;
        let limiter = RateLimiter::direct(Quota::per_second(qps));
        Ok(Self { client, model, limiter })
    }

    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        Self::new(cfg.model.clone(), cfg.base_url.clone(), cfg.api_key(), cfg.requests_per_second, cfg.timeout_ms)
    }
}

pub(crate) fn build_client(
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_ms: u64,
) -> Result<Client<OpenAIConfig>> {
    let mut cfg = OpenAIConfig::default();
    if let Some(url) = base_url {
        cfg = cfg.with_api_base(url);
    }
    if let Some(key) = api_key {
        cfg = cfg.with_api_key(key);
    }
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .context("building HTTP client")?;
    Ok(Client::with_config(cfg).with_http_client(http))
}

#[async_trait::async_trait]
impl Llm for LlmClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.limiter.until_ready().await;

        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()?
            .into();
        let req = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![message])
            .max_tokens(params.max_tokens)
            .temperature(params.effective_temperature())
            .build()?;

        let resp = self.client.chat().create(req).await.context("chat completion request")?;
        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion returned no content"))?;
        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }
}
