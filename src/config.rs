//! TOML configuration.
//!
//! Every section is optional; missing sections take the defaults below, which
//! reproduce the diagnosis / lab / medication substitution table used to build
//! the first dataset.
//!
//! ```toml
//! [intervention]
//! seed = 42
//! fallback_sentences = ["Patient was started on a new low-sodium diet plan."]
//!
//! [[intervention.rules]]
//! trigger = "pneumonia"
//! replacement = "diagnosed with mild bronchitis instead of pneumonia"
//!
//! [checker]
//! threshold = 0.85
//!
//! [llm]
//! model = "Qwen/Qwen3-8B"
//! base_url = "http://localhost:8000/v1"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::GenerationParams;
use crate::segments::word_tokens;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub trigger: String,
    pub replacement: String,
}

impl SubstitutionRule {
    pub fn new(trigger: &str, replacement: &str) -> Self {
        Self { trigger: trigger.to_string(), replacement: replacement.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionConfig {
    /// Applied in order; later rules see the output of earlier ones.
    pub rules: Vec<SubstitutionRule>,
    pub fallback_sentences: Vec<String>,
    /// Fixed seed for the fallback choice. Entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        let rules = [
            // diagnoses
            ("pneumonia", "diagnosed with mild bronchitis instead of pneumonia"),
            ("heart failure", "diagnosed with mild hypertension instead of heart failure"),
            ("stroke", "diagnosed with a transient ischemic attack instead of a stroke"),
            ("osteoporosis", "no history of osteoporosis"),
            // labs
            ("high creatinine", "creatinine levels were normal"),
            ("elevated WBC", "WBC count was within normal range"),
            ("low hemoglobin", "hemoglobin was in the normal range"),
            // medications
            ("antibiotics", "no antibiotics were administered"),
            ("insulin", "managed without insulin"),
            ("diuretics", "did not receive diuretics"),
            ("unsuccessful", "successful"),
        ]
        .into_iter()
        .map(|(t, r)| SubstitutionRule::new(t, r))
        .collect();

        let fallback_sentences = [
            "Patient was started on a new low-sodium diet plan.",
            "Follow-up care included physiotherapy sessions twice a week.",
            "Patient's medication regimen was adjusted to reduce side effects.",
            "Blood pressure monitoring was emphasized for at-home care.",
            "Patient's exercise plan was modified for gradual recovery.",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self { rules, fallback_sentences, seed: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// `changed = similarity < threshold`.
    pub threshold: f32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self { threshold: crate::consistency::DEFAULT_THRESHOLD }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsweringConfig {
    pub max_tokens: u16,
    pub temperature: f32,
    pub do_sample: bool,
}

impl Default for AnsweringConfig {
    fn default() -> Self {
        Self { max_tokens: 64, temperature: 0.7, do_sample: true }
    }
}

impl AnsweringConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams { max_tokens: self.max_tokens, temperature: self.temperature, do_sample: self.do_sample }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u16,
    /// Upper bound on the share of any single causal type among kept pairs.
    pub max_fraction: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_tokens: 2048, max_fraction: 0.4 }
    }
}

impl GenerationConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams { max_tokens: self.max_tokens, temperature: 0.0, do_sample: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub max_tokens: u16,
    pub temperature: f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self { max_tokens: 2048, temperature: 0.7 }
    }
}

impl JudgeConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams { max_tokens: self.max_tokens, temperature: self.temperature, do_sample: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub requests_per_second: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "Qwen/Qwen3-8B".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            requests_per_second: 1,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: "sentence-transformers/all-MiniLM-L6-v2".to_string(), base_url: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub intervention: InterventionConfig,
    pub checker: CheckerConfig,
    pub answering: AnsweringConfig,
    pub generation: GenerationConfig,
    pub judge: JudgeConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
}

impl AppConfig {
    /// Read, parse and validate a TOML file. Any failure is returned; nothing
    /// silently falls back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_intervention(&self.intervention.rules, &self.intervention.fallback_sentences)?;
        validate_threshold(self.checker.threshold)?;
        let f = self.generation.max_fraction;
        if !(f > 0.0 && f <= 1.0) {
            return Err(ConfigError::invalid("generation.max_fraction", format!("{f} is outside (0, 1]")));
        }
        if self.llm.requests_per_second == 0 {
            return Err(ConfigError::invalid("llm.requests_per_second", "must be at least 1"));
        }
        Ok(())
    }
}

/// Every trigger must be non-empty and every fallback sentence must carry at
/// least one word, otherwise an intervention could leave the text unchanged.
pub fn validate_intervention(rules: &[SubstitutionRule], fallbacks: &[String]) -> Result<(), ConfigError> {
    if let Some(pos) = rules.iter().position(|r| r.trigger.is_empty()) {
        return Err(ConfigError::invalid("intervention.rules", format!("rule {pos} has an empty trigger")));
    }
    if fallbacks.is_empty() {
        return Err(ConfigError::invalid("intervention.fallback_sentences", "at least one sentence is required"));
    }
    if let Some(pos) = fallbacks.iter().position(|s| word_tokens(s).is_empty()) {
        return Err(ConfigError::invalid(
            "intervention.fallback_sentences",
            format!("sentence {pos} contains no words"),
        ));
    }
    Ok(())
}

pub fn validate_threshold(threshold: f32) -> Result<(), ConfigError> {
    if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
        return Err(ConfigError::invalid("checker.threshold", format!("{threshold} is outside [-1, 1]")));
    }
    Ok(())
}
