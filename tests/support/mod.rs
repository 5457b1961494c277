#![allow(dead_code)]

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use intervene_rs::embedding::Embedder;
use intervene_rs::llm::{GenerationParams, Llm};
use intervene_rs::segments::word_tokens;

pub struct FakeLlm {
    /// Maps each prompt to a response or an error message.
    pub handler: Box<dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(handler: impl Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), prompts: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Llm for FakeLlm {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.handler)(prompt).map_err(|e| anyhow::anyhow!(e))
    }
}

/// Bag-of-words embedding over 64 hashed buckets.
pub struct BagOfWords;

#[async_trait]
impl Embedder for BagOfWords {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; 64];
        for tok in word_tokens(text) {
            let bucket = tok.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize)) % 64;
            v[bucket] += 1.0;
        }
        Ok(v)
    }
}

/// The summary text a grounding prompt was built from.
pub fn grounded_summary(prompt: &str) -> &str {
    prompt.split("\"\"\"").nth(1).unwrap_or_default()
}

pub fn params() -> GenerationParams {
    GenerationParams { max_tokens: 64, temperature: 0.7, do_sample: true }
}
