//! QA-pair generation from discharge summaries.
//!
//! The model is asked for one or more blocks of the form
//!
//! ```text
//! Factual QA:
//! Q: <multi-entity causal question>
//! A: <answer>
//!
//! Counterfactual QA:
//! Q: <what-if question>
//! A: <answer>
//! ```
//!
//! Blocks are parsed, de-duplicated, and thinned so no single causal type
//! dominates the dataset.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::{strip_prompt_echo, GenerationParams, Llm};
use crate::types::{QaPair, QaRecord, SummaryRecord};

pub fn build_generation_prompt(summary: &str) -> String {
    format!(
        "\nYou are an expert in clinical reasoning. Your task is to generate multi-entity, medically factual and causal QA pairs based on a discharge summary.\n\n\
Instructions:\n\
- Each QA pair should involve at least two distinct medical entities (e.g., a diagnosis and a lab result, or a diagnosis and a medication).\n\
- The question should ask about the reason or cause for both entities or an outcome that results from their interaction.\n\
- The answer should explain the causal relationship connecting the entities and the outcome.\n\
- Then, generate a counterfactual version of the question and answer, explaining what would happen if one or both entities were not present.\n\n\
Discharge Summary:\n{summary}\n\n\
Output format:\n\
Factual QA:\n\
Q: <Multi-entity causal question>\n\
A: <Answer explaining how both entities caused or contributed to outcome>\n\n\
Counterfactual QA:\n\
Q: <What if... question removing one or both entities>\n\
A: <Answer explaining how absence of one/both entities changes outcome>\n"
    )
}

/// Extract complete QA blocks. A block opened by `Factual QA:` is emitted
/// once its counterfactual answer is filled; incomplete blocks are dropped.
pub fn parse_qa_output(text: &str) -> Vec<QaPair> {
    let mut blocks = Vec::new();
    let mut current: Option<QaPair> = None;

    for line in text.lines().map(str::trim_start) {
        if line.starts_with("Factual QA:") {
            current = Some(QaPair::default());
            continue;
        }
        if line.starts_with("Counterfactual QA:") {
            continue;
        }
        let Some(pair) = current.as_mut() else { continue };
        if let Some(q) = line.strip_prefix("Q:") {
            if pair.factual_q.is_empty() {
                pair.factual_q = q.trim().to_string();
            } else if pair.counter_q.is_empty() {
                pair.counter_q = q.trim().to_string();
            }
        } else if let Some(a) = line.strip_prefix("A:") {
            if pair.factual_a.is_empty() {
                pair.factual_a = a.trim().to_string();
            } else if pair.counter_a.is_empty() {
                pair.counter_a = a.trim().to_string();
                blocks.push(pair.clone());
            }
        }
    }
    blocks
}

/// Drop case-insensitive duplicates over all four fields, keeping the first.
pub fn dedup_pairs<T: AsRef<QaPair>>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let p = item.as_ref();
            seen.insert((
                p.factual_q.to_lowercase(),
                p.factual_a.to_lowercase(),
                p.counter_q.to_lowercase(),
                p.counter_a.to_lowercase(),
            ))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalType {
    ProcedureComplication,
    DiagnosisEffect,
    MedicationEffect,
    Other,
}

impl CausalType {
    pub fn classify(factual_answer: &str) -> Self {
        let fact = factual_answer.to_lowercase();
        if !(fact.contains("due to") || fact.contains("because")) {
            return CausalType::Other;
        }
        if ["procedure", "ectomy", "surgery"].iter().any(|k| fact.contains(k)) {
            CausalType::ProcedureComplication
        } else if ["diagnosis", "disease"].iter().any(|k| fact.contains(k)) {
            CausalType::DiagnosisEffect
        } else if ["medication", "mg"].iter().any(|k| fact.contains(k)) {
            CausalType::MedicationEffect
        } else {
            CausalType::Other
        }
    }
}

/// Keep a pair while its causal type's share of the input stays within
/// `max_fraction`.
pub fn diversity_filter<T: AsRef<QaPair>>(items: Vec<T>, max_fraction: f64) -> Vec<T> {
    let total = items.len() as f64;
    let mut counts: HashMap<CausalType, usize> = HashMap::new();
    let mut kept = Vec::new();
    for item in items {
        let count = counts.entry(CausalType::classify(&item.as_ref().factual_a)).or_default();
        if *count as f64 / total <= max_fraction {
            *count += 1;
            kept.push(item);
        }
    }
    kept
}

pub async fn generate_for_summary(
    llm: &dyn Llm,
    rec: &SummaryRecord,
    params: &GenerationParams,
) -> anyhow::Result<Vec<QaPair>> {
    let prompt = build_generation_prompt(&rec.summary);
    let raw = llm.generate(&prompt, params).await?;
    Ok(parse_qa_output(&strip_prompt_echo(&prompt, &raw)))
}

struct Sourced {
    source: usize,
    pair: QaPair,
}

impl AsRef<QaPair> for Sourced {
    fn as_ref(&self) -> &QaPair {
        &self.pair
    }
}

/// Generate, dedup and filter QA pairs for every summary. A failed summary is
/// logged and contributes nothing.
pub async fn generate_dataset(
    llm: &dyn Llm,
    summaries: &[SummaryRecord],
    params: &GenerationParams,
    max_fraction: f64,
) -> Vec<QaRecord> {
    let mut parsed = Vec::new();
    for (source, rec) in summaries.iter().enumerate() {
        match generate_for_summary(llm, rec, params).await {
            Ok(pairs) => {
                info!(subject_id = %rec.subject_id, pairs = pairs.len(), "qa pairs parsed");
                parsed.extend(pairs.into_iter().map(|pair| Sourced { source, pair }));
            }
            Err(e) => warn!(subject_id = %rec.subject_id, error = %e, "qa generation failed"),
        }
    }

    let parsed_count = parsed.len();
    let deduped = dedup_pairs(parsed);
    let deduped_count = deduped.len();
    let kept = diversity_filter(deduped, max_fraction);
    info!(parsed = parsed_count, deduped = deduped_count, kept = kept.len(), "qa dataset built");

    kept.into_iter()
        .map(|Sourced { source, pair }| {
            let src = &summaries[source];
            pair.into_record(src.subject_id.clone(), &src.summary)
        })
        .collect()
}
