pub mod openai;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u16,
    pub temperature: f32,
    /// When false, decoding is greedy regardless of `temperature`.
    pub do_sample: bool,
}

impl GenerationParams {
    pub fn effective_temperature(&self) -> f32 {
        if self.do_sample { self.temperature } else { 0.0 }
    }
}

/// Answering collaborator: prompt in, text out.
///
/// Implementations should return only the continuation. Callers still strip an
/// echoed prompt prefix (see [`strip_prompt_echo`]) so backends that return
/// prompt + continuation also work.
#[async_trait::async_trait]
pub trait Llm: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Drop a leading copy of `prompt` from `raw` and trim the remainder.
pub fn strip_prompt_echo(prompt: &str, raw: &str) -> String {
    raw.strip_prefix(prompt).unwrap_or(raw).trim().to_string()
}
