//! Answer consistency checking.
//!
//! A question is answered twice, once grounded in each summary, and the two
//! answers are compared by embedding similarity. `changed` is
//! `similarity < threshold`: raising the threshold makes a change easier to
//! report, lowering it makes it harder.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::config::validate_threshold;
use crate::error::{CheckError, ConfigError, Side};
use crate::llm::{strip_prompt_echo, GenerationParams, Llm};

pub const DEFAULT_THRESHOLD: f32 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerComparison {
    pub answer_a: String,
    pub answer_b: String,
    pub similarity: f32,
    pub changed: bool,
}

pub fn build_grounding_prompt(summary: &str, question: &str) -> String {
    format!(
        "\nYou are a clinical reasoning assistant.\n\n\
Given the discharge summary, answer the following question as accurately and concisely as possible, \
using only the information in the summary.\n\n\
Discharge Summary:\n\"\"\"{}\"\"\"\n\n\
Question: {}\nAnswer:",
        summary.trim(),
        question
    )
}

pub fn is_changed(similarity: f32, threshold: f32) -> bool {
    similarity < threshold
}

pub struct ConsistencyChecker {
    answerer: Arc<dyn Llm>,
    embedder: Arc<dyn Embedder>,
    params: GenerationParams,
    threshold: f32,
}

impl ConsistencyChecker {
    pub fn new(answerer: Arc<dyn Llm>, embedder: Arc<dyn Embedder>, params: GenerationParams) -> Self {
        Self { answerer, embedder, params, threshold: DEFAULT_THRESHOLD }
    }

    /// Thresholds outside [-1, 1], or NaN, are rejected.
    pub fn with_threshold(mut self, threshold: f32) -> Result<Self, ConfigError> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Ask `question` against both summaries and compare the answers.
    ///
    /// Both collaborator calls are always attempted, one after the other; a
    /// failure on either side is returned without retrying.
    pub async fn check(
        &self,
        question: &str,
        summary_a: &str,
        summary_b: &str,
    ) -> Result<AnswerComparison, CheckError> {
        let answer_a = self.ask(summary_a, question).await;
        let answer_b = self.ask(summary_b, question).await;

        let (answer_a, answer_b) = match (answer_a, answer_b) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(cause), Ok(_)) => return Err(CheckError::Answer { side: Side::Original, cause }),
            (Ok(_), Err(cause)) => return Err(CheckError::Answer { side: Side::Intervened, cause }),
            (Err(original), Err(intervened)) => return Err(CheckError::BothAnswers { original, intervened }),
        };

        let similarity = self.similarity(&answer_a, &answer_b).await?;
        let changed = is_changed(similarity, self.threshold);
        debug!(similarity, threshold = self.threshold, changed, "answers compared");
        Ok(AnswerComparison { answer_a, answer_b, similarity, changed })
    }

    async fn ask(&self, summary: &str, question: &str) -> anyhow::Result<String> {
        let prompt = build_grounding_prompt(summary, question);
        let raw = self.answerer.generate(&prompt, &self.params).await?;
        Ok(strip_prompt_echo(&prompt, &raw))
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f32, CheckError> {
        // Identical answers are maximally similar whatever the embedder does
        // with them (an empty string may embed to a zero vector).
        if a == b {
            return Ok(1.0);
        }
        let ea = self.embedder.embed(a).await.map_err(|cause| CheckError::Embedding { cause })?;
        let eb = self.embedder.embed(b).await.map_err(|cause| CheckError::Embedding { cause })?;
        if ea.is_empty() || ea.len() != eb.len() {
            return Err(CheckError::Embedding {
                cause: anyhow!("malformed embeddings: dimensions {} and {}", ea.len(), eb.len()),
            });
        }
        Ok(cosine_similarity(&ea, &eb))
    }
}
