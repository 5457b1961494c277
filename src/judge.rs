use tracing::{info, warn};

use crate::llm::{strip_prompt_echo, GenerationParams, Llm};
use crate::types::{JudgeRecord, LabeledVerdict, QaRecord, Verdict};

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn build_judge_prompt(rec: &QaRecord) -> String {
    let mut qa = String::new();
    for (i, q) in rec.questions.iter().enumerate() {
        let n = i + 1;
        qa.push_str(&format!(
            "{} QA:\nQ{n}: {}\nA{n}: {}\n\n",
            title_case(&q.label),
            q.text,
            q.reference_answer.as_deref().unwrap_or_default()
        ));
    }
    let format_lines = rec
        .questions
        .iter()
        .map(|q| format!("{} Answer Correct: Yes/No", title_case(&q.label)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nYou are a clinical QA evaluator.\n\n\
Evaluate whether the following question-answer pairs are factually correct and logically consistent with the discharge summary context.\n\
Provide a short justification and mark each answer as Yes or No.\n\n\
discharge summary: {}\n\n{qa}\
Finally, respond strictly in this format:\n{format_lines}\nComment: <short explanation>\n",
        rec.summary_original
    )
}

/// Read `<Label> Answer Correct: Yes|No` for `label`. A missing or
/// unrecognised line counts as `No`.
pub fn parse_verdict(output: &str, label: &str) -> Verdict {
    let prefix = format!("{} answer correct:", label.to_lowercase());
    for line in output.lines() {
        let lower = line.trim().trim_start_matches(['*', '-', ' ']).to_lowercase();
        if let Some(rest) = lower.strip_prefix(&prefix) {
            return if rest.trim_start_matches(['*', ' ']).starts_with("yes") { Verdict::Yes } else { Verdict::No };
        }
    }
    Verdict::No
}

/// Everything after the first `Comment:`, or empty when absent.
pub fn parse_comment(output: &str) -> String {
    output
        .find("Comment:")
        .map(|i| output[i + "Comment:".len()..].trim().to_string())
        .unwrap_or_default()
}

/// Judge one record. A failed call yields `Error` verdicts with the error as
/// the comment rather than an `Err`.
pub async fn judge_record(llm: &dyn Llm, rec: &QaRecord, params: &GenerationParams) -> JudgeRecord {
    let prompt = build_judge_prompt(rec);
    match llm.generate(&prompt, params).await {
        Ok(raw) => {
            let out = strip_prompt_echo(&prompt, &raw);
            let verdicts = rec
                .questions
                .iter()
                .map(|q| LabeledVerdict { label: q.label.clone(), verdict: parse_verdict(&out, &q.label) })
                .collect();
            info!(subject_id = %rec.subject_id, "record judged");
            JudgeRecord { subject_id: rec.subject_id.clone(), verdicts, comment: parse_comment(&out) }
        }
        Err(e) => {
            warn!(subject_id = %rec.subject_id, error = %e, "judge call failed");
            let verdicts = rec
                .questions
                .iter()
                .map(|q| LabeledVerdict { label: q.label.clone(), verdict: Verdict::Error })
                .collect();
            JudgeRecord { subject_id: rec.subject_id.clone(), verdicts, comment: format!("{e:#}") }
        }
    }
}

pub async fn judge_all(llm: &dyn Llm, records: &[QaRecord], params: &GenerationParams) -> Vec<JudgeRecord> {
    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        out.push(judge_record(llm, rec, params).await);
    }
    out
}
