use anyhow::{anyhow, Context, Result};
use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};

use super::Embedder;
use crate::config::{EmbeddingConfig, LlmConfig};
use crate::llm::openai::build_client;

/// Embeddings endpoint of an OpenAI-compatible server.
pub struct EmbeddingClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl EmbeddingClient {
    pub fn new(model: String, base_url: Option<String>, api_key: Option<String>, timeout_ms: u64) -> Result<Self> {
        Ok(Self { client: build_client(base_url, api_key, timeout_ms)?, model })
    }

    /// Falls back to the LLM endpoint and credentials when no embedding URL is set.
    pub fn from_config(cfg: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self> {
        let base_url = cfg.base_url.clone().or_else(|| llm.base_url.clone());
        Self::new(cfg.model.clone(), base_url, llm.api_key(), llm.timeout_ms)
    }
}

#[async_trait::async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let req = CreateEmbeddingRequestArgs::default()
            .model(self.model.clone())
            .input(text.to_string())
            .build()?;
        let resp = self.client.embeddings().create(req).await.context("embedding request")?;
        resp.data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| anyhow!("embedding response was empty"))
    }
}
