use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque patient identifier, carried through every stage unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub serde_json::Value);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        SubjectId(id.into())
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        SubjectId(id.into())
    }
}

pub const FACTUAL: &str = "factual";
pub const COUNTERFACTUAL: &str = "counterfactual";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_answer: Option<String>,
}

impl Question {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { label: label.into(), text: text.into(), reference_answer: None }
    }

    pub fn with_reference(mut self, answer: impl Into<String>) -> Self {
        self.reference_answer = Some(answer.into());
        self
    }
}

/// One unit of evaluation input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    #[serde(default)]
    pub subject_id: SubjectId,
    #[serde(default, alias = "discharge_summary")]
    pub summary_original: String,
    #[serde(default, alias = "discharge_summary_intervened", skip_serializing_if = "Option::is_none")]
    pub summary_intervened: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Input to QA generation: a bare discharge summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(default)]
    pub subject_id: SubjectId,
    #[serde(default, alias = "discharge_summary")]
    pub summary: String,
}

/// A factual / counterfactual question-answer pair parsed from generator output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub factual_q: String,
    pub factual_a: String,
    pub counter_q: String,
    pub counter_a: String,
}

impl AsRef<QaPair> for QaPair {
    fn as_ref(&self) -> &QaPair {
        self
    }
}

impl QaPair {
    pub fn into_record(self, subject_id: SubjectId, summary: &str) -> QaRecord {
        QaRecord {
            subject_id,
            summary_original: summary.to_string(),
            summary_intervened: None,
            questions: vec![
                Question::new(FACTUAL, self.factual_q).with_reference(self.factual_a),
                Question::new(COUNTERFACTUAL, self.counter_q).with_reference(self.counter_a),
            ],
        }
    }
}

/// Answers to one question under both summaries, plus the change decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabeledComparison {
    pub label: String,
    pub question: String,
    pub answer_original: String,
    pub answer_intervened: String,
    pub similarity: f32,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Ok { answers: Vec<LabeledComparison> },
    Error { error: String },
}

/// One unit of evaluation output, one per QA record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(default)]
    pub subject_id: SubjectId,
    #[serde(flatten)]
    pub outcome: EvaluationOutcome,
}

impl EvaluationResult {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, EvaluationOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Yes,
    No,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledVerdict {
    pub label: String,
    pub verdict: Verdict,
}

/// LLM-as-judge assessment of a record's reference answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRecord {
    pub subject_id: SubjectId,
    pub verdicts: Vec<LabeledVerdict>,
    pub comment: String,
}
