use tracing::{info, warn};

use crate::consistency::ConsistencyChecker;
use crate::error::CheckError;
use crate::intervention::InterventionGenerator;
use crate::types::{EvaluationOutcome, EvaluationResult, LabeledComparison, QaRecord};

/// Check every question of one record. The record must already carry its
/// intervened summary; the first failing question fails the whole record.
pub async fn evaluate_record(
    checker: &ConsistencyChecker,
    rec: &QaRecord,
) -> Result<Vec<LabeledComparison>, CheckError> {
    let intervened = rec.summary_intervened.as_deref().unwrap_or_default();
    let mut answers = Vec::with_capacity(rec.questions.len());
    for q in &rec.questions {
        let cmp = checker.check(&q.text, &rec.summary_original, intervened).await?;
        answers.push(LabeledComparison {
            label: q.label.clone(),
            question: q.text.clone(),
            answer_original: cmp.answer_a,
            answer_intervened: cmp.answer_b,
            similarity: cmp.similarity,
            changed: cmp.changed,
        });
    }
    Ok(answers)
}

/// Evaluate records one at a time, each to completion before the next:
/// intervene if needed, then check every question. Failures become error
/// markers and the batch moves on.
pub async fn evaluate_all(
    checker: &ConsistencyChecker,
    generator: &mut InterventionGenerator,
    records: Vec<QaRecord>,
) -> Vec<EvaluationResult> {
    let total = records.len();
    let mut results = Vec::with_capacity(total);

    for (idx, mut rec) in records.into_iter().enumerate() {
        generator.intervene_record(&mut rec);
        let outcome = match evaluate_record(checker, &rec).await {
            Ok(answers) => {
                let changed = answers.iter().filter(|a| a.changed).count();
                info!(subject_id = %rec.subject_id, idx, total, changed, "record evaluated");
                EvaluationOutcome::Ok { answers }
            }
            Err(e) => {
                warn!(subject_id = %rec.subject_id, idx, error = %e, "record evaluation failed");
                EvaluationOutcome::Error { error: e.to_string() }
            }
        };
        results.push(EvaluationResult { subject_id: rec.subject_id, outcome });
    }

    let errors = results.iter().filter(|r| r.is_error()).count();
    info!(total, errors, "evaluation finished");
    results
}
