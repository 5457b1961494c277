//! Counterfactual interventions on clinical discharge summaries.
//!
//! Pipeline: generate QA pairs from summaries, intervene on each summary
//! (flip a clinical fact or append a plausible statement), ask every question
//! against the original and intervened summary, and decide by embedding
//! similarity whether the answer meaningfully changed.

pub mod config;
pub mod consistency;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod intervention;
pub mod jsonl;
pub mod judge;
pub mod llm;
pub mod scoring;
pub mod segments;
pub mod types;

pub use config::AppConfig;
pub use consistency::{AnswerComparison, ConsistencyChecker, DEFAULT_THRESHOLD};
pub use error::{CheckError, ConfigError};
pub use intervention::{Intervention, InterventionGenerator};
