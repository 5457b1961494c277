use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{EvaluationOutcome, EvaluationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelScore {
    pub questions: usize,
    pub changed: usize,
    pub change_rate: f32,
    pub mean_similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub records: usize,
    pub ok: usize,
    pub errors: usize,
    pub labels: BTreeMap<String, LabelScore>,
}

pub fn score_results(results: &[EvaluationResult]) -> ScoreSummary {
    let mut summary = ScoreSummary { records: results.len(), ..ScoreSummary::default() };
    let mut similarity_sums: BTreeMap<String, f32> = BTreeMap::new();

    for r in results {
        match &r.outcome {
            EvaluationOutcome::Error { .. } => summary.errors += 1,
            EvaluationOutcome::Ok { answers } => {
                summary.ok += 1;
                for a in answers {
                    let s = summary.labels.entry(a.label.clone()).or_default();
                    s.questions += 1;
                    s.changed += usize::from(a.changed);
                    *similarity_sums.entry(a.label.clone()).or_default() += a.similarity;
                }
            }
        }
    }

    for (label, s) in summary.labels.iter_mut() {
        let n = s.questions.max(1) as f32;
        s.change_rate = s.changed as f32 / n;
        s.mean_similarity = similarity_sums.get(label).copied().unwrap_or_default() / n;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LabeledComparison;

    fn cmp(label: &str, similarity: f32) -> LabeledComparison {
        LabeledComparison {
            label: label.into(),
            question: "q".into(),
            answer_original: "a".into(),
            answer_intervened: "b".into(),
            similarity,
            changed: similarity < 0.85,
        }
    }

    #[test]
    fn rates_per_label_and_error_count() {
        let results = vec![
            EvaluationResult {
                subject_id: 1.into(),
                outcome: EvaluationOutcome::Ok { answers: vec![cmp("factual", 0.5), cmp("counterfactual", 0.9)] },
            },
            EvaluationResult {
                subject_id: 2.into(),
                outcome: EvaluationOutcome::Ok { answers: vec![cmp("factual", 0.9), cmp("counterfactual", 0.7)] },
            },
            EvaluationResult { subject_id: 3.into(), outcome: EvaluationOutcome::Error { error: "timeout".into() } },
        ];
        let s = score_results(&results);
        assert_eq!((s.records, s.ok, s.errors), (3, 2, 1));
        let f = &s.labels["factual"];
        assert_eq!(f.questions, 2);
        assert_eq!(f.changed, 1);
        assert!((f.change_rate - 0.5).abs() < 1e-6);
        assert!((f.mean_similarity - 0.7).abs() < 1e-6);
    }

    #[test]
    fn empty_input_scores_zero() {
        let s = score_results(&[]);
        assert_eq!(s, ScoreSummary::default());
    }
}
