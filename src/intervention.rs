//! Counterfactual edits on discharge summaries.
//!
//! Each configured rule flips one clinical fact (a diagnosis, a lab value, a
//! medication) wherever its trigger occurs. A summary whose words no rule
//! changes gets one generic but plausible sentence appended instead, so the
//! output always differs from the input by at least one token.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{validate_intervention, InterventionConfig, SubstitutionRule};
use crate::error::ConfigError;
use crate::segments::token_difference;
use crate::types::QaRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Intervention {
    pub text: String,
    /// Triggers whose replacement changed the text, in rule order.
    pub applied: Vec<String>,
    /// The appended sentence, when the rules left every token in place.
    pub fallback: Option<String>,
    pub changed_tokens: usize,
}

pub struct InterventionGenerator {
    rules: Vec<SubstitutionRule>,
    fallback_sentences: Vec<String>,
    rng: StdRng,
}

impl InterventionGenerator {
    pub fn new(
        rules: Vec<SubstitutionRule>,
        fallback_sentences: Vec<String>,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        validate_intervention(&rules, &fallback_sentences)?;
        Ok(Self { rules, fallback_sentences, rng })
    }

    pub fn from_config(cfg: &InterventionConfig) -> Result<Self, ConfigError> {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(cfg.rules.clone(), cfg.fallback_sentences.clone(), rng)
    }

    pub fn intervene(&mut self, summary: &str) -> String {
        self.intervene_detailed(summary).text
    }

    pub fn intervene_detailed(&mut self, summary: &str) -> Intervention {
        apply(&self.rules, &self.fallback_sentences, summary, &mut self.rng)
    }

    /// Fill `summary_intervened` if the record does not have one yet.
    pub fn intervene_record(&mut self, rec: &mut QaRecord) {
        if rec.summary_intervened.is_some() {
            return;
        }
        let out = self.intervene_detailed(&rec.summary_original);
        debug!(
            subject_id = %rec.subject_id,
            applied = ?out.applied,
            fallback = out.fallback.is_some(),
            changed_tokens = out.changed_tokens,
            "summary intervened"
        );
        rec.summary_intervened = Some(out.text);
    }
}

fn apply<R: Rng + ?Sized>(
    rules: &[SubstitutionRule],
    fallbacks: &[String],
    summary: &str,
    rng: &mut R,
) -> Intervention {
    let mut text = summary.to_string();
    let mut applied = Vec::new();

    // Detection is case-insensitive, replacement is not; a trigger that only
    // matches in another case leaves the text alone and does not count.
    for rule in rules {
        if !text.to_lowercase().contains(&rule.trigger.to_lowercase()) {
            continue;
        }
        let replaced = text.replace(&rule.trigger, &rule.replacement);
        if replaced != text {
            applied.push(rule.trigger.clone());
            text = replaced;
        }
    }

    // Case or punctuation edits alone do not count as a change.
    let mut fallback = None;
    let mut changed_tokens = token_difference(summary, &text);
    if changed_tokens == 0 {
        if let Some(sentence) = fallbacks.choose(rng) {
            text.push(' ');
            text.push_str(sentence);
            fallback = Some(sentence.clone());
            changed_tokens = token_difference(summary, &text);
        }
    }

    Intervention { text, applied, fallback, changed_tokens }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterventionConfig;
    use proptest::prelude::*;

    const FALLBACKS: [&str; 2] = ["Diet was changed.", "Physiotherapy was added."];

    fn generator(rules: &[(&str, &str)], fallbacks: &[&str]) -> InterventionGenerator {
        InterventionGenerator::new(
            rules.iter().map(|(t, r)| SubstitutionRule::new(t, r)).collect(),
            fallbacks.iter().map(|s| s.to_string()).collect(),
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    fn default_generator() -> InterventionGenerator {
        InterventionGenerator::from_config(&InterventionConfig::default()).unwrap()
    }

    #[test]
    fn pneumonia_is_flipped_to_bronchitis() {
        let mut g = generator(&[("pneumonia", "diagnosed with mild bronchitis instead of pneumonia")], &["Fallback."]);
        let s = "Patient diagnosed with pneumonia and started on antibiotics.";
        let out = g.intervene(s);
        assert_ne!(out, s);
        assert!(out.contains("mild bronchitis instead of pneumonia"));
        assert!(!out.contains("diagnosed with pneumonia"));
    }

    #[test]
    fn all_matching_rules_apply_in_order() {
        let mut g = default_generator();
        let out = g.intervene_detailed("Patient diagnosed with pneumonia and started on antibiotics.");
        assert_eq!(out.applied, vec!["pneumonia".to_string(), "antibiotics".to_string()]);
        assert!(out.text.contains("no antibiotics were administered"));
        assert!(out.fallback.is_none());
        assert!(out.changed_tokens > 0);
    }

    #[test]
    fn no_trigger_appends_exactly_one_fallback() {
        let fallbacks = FALLBACKS;
        let mut g = generator(&[("stroke", "TIA")], &fallbacks);
        let s = "The patient underwent hemorrhoidectomy.";
        let out = g.intervene_detailed(s);
        assert!(out.text.len() > s.len());
        assert!(out.text.starts_with(s));
        let tail = &out.text[s.len()..];
        assert!(fallbacks.iter().any(|f| tail == format!(" {f}")));
        assert_eq!(out.fallback.as_deref(), Some(tail.trim_start()));
        assert!(out.applied.is_empty());
    }

    #[test]
    fn blank_summary_still_changes() {
        let mut g = generator(&[("stroke", "TIA")], &["Diet was changed."]);
        assert_eq!(g.intervene(""), " Diet was changed.");
        assert_eq!(g.intervene("   "), "    Diet was changed.");
    }

    #[test]
    fn case_only_match_falls_back() {
        let mut g = generator(&[("pneumonia", "bronchitis")], &["Diet was changed."]);
        let out = g.intervene_detailed("Pneumonia resolved.");
        assert!(out.applied.is_empty());
        assert_eq!(out.text, "Pneumonia resolved. Diet was changed.");
    }

    #[test]
    fn detection_is_case_insensitive_for_mixed_case_triggers() {
        let mut g = default_generator();
        let out = g.intervene_detailed("Labs showed elevated WBC on admission.");
        assert_eq!(out.applied, vec!["elevated WBC".to_string()]);
        assert!(out.text.contains("WBC count was within normal range"));
    }

    #[test]
    fn later_rules_see_earlier_replacements() {
        let mut g = generator(&[("fever", "no fever but a cough"), ("cough", "sore throat")], &["x."]);
        let out = g.intervene("Admitted with fever.");
        assert_eq!(out, "Admitted with no fever but a sore throat.");
    }

    #[test]
    fn not_idempotent_when_replacement_reintroduces_trigger() {
        let mut g = generator(&[("pneumonia", "diagnosed with mild bronchitis instead of pneumonia")], &["x."]);
        let once = g.intervene("pneumonia");
        let twice = g.intervene(&once);
        assert_ne!(once, twice);
    }

    #[test]
    fn cancelling_rules_still_guarantee_a_change() {
        let mut g = generator(&[("left", "right"), ("right", "left")], &["Diet was changed."]);
        let out = g.intervene("left knee");
        assert_eq!(out, "left knee Diet was changed.");
    }

    #[test]
    fn seeded_generators_agree() {
        let cfg = InterventionConfig { seed: Some(42), ..InterventionConfig::default() };
        let mut a = InterventionGenerator::from_config(&cfg).unwrap();
        let mut b = InterventionGenerator::from_config(&cfg).unwrap();
        for _ in 0..5 {
            assert_eq!(a.intervene("Uneventful stay."), b.intervene("Uneventful stay."));
        }
    }

    #[test]
    fn existing_intervention_is_kept() {
        let mut g = generator(&[("stroke", "TIA")], &["x."]);
        let mut rec = QaRecord {
            summary_original: "stroke".into(),
            summary_intervened: Some("precomputed".into()),
            ..QaRecord::default()
        };
        g.intervene_record(&mut rec);
        assert_eq!(rec.summary_intervened.as_deref(), Some("precomputed"));

        rec.summary_intervened = None;
        g.intervene_record(&mut rec);
        assert_eq!(rec.summary_intervened.as_deref(), Some("TIA"));
    }

    #[test]
    fn case_only_replacement_still_gets_a_fallback() {
        let mut g = generator(&[("afib", "AFib")], &["Diet was changed."]);
        let out = g.intervene_detailed("History of afib.");
        assert_eq!(out.applied, vec!["afib".to_string()]);
        assert_eq!(out.text, "History of AFib. Diet was changed.");
        assert_eq!(out.fallback.as_deref(), Some("Diet was changed."));
        assert_eq!(out.changed_tokens, 3);
    }

    #[test]
    fn unusable_tables_are_rejected() {
        let rules = vec![SubstitutionRule::new("", "x")];
        let err = InterventionGenerator::new(rules, vec!["Diet was changed.".into()], StdRng::seed_from_u64(1));
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));

        let err = InterventionGenerator::new(vec![], vec![], StdRng::seed_from_u64(1));
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    proptest! {
        /// A present trigger is always swapped for its replacement.
        #[test]
        fn trigger_is_replaced_wherever_it_occurs(
            prefix in "[a-z ,.]{0,40}",
            trigger in "[a-z]{3,12}",
            replacement in "[A-Z][a-z]{2,12}",
            suffix in "[a-z ,.]{0,40}",
        ) {
            let s = format!("{prefix}{trigger}{suffix}");
            let mut g = generator(&[(trigger.as_str(), replacement.as_str())], &FALLBACKS);
            let out = g.intervene_detailed(&s);
            prop_assert_ne!(&out.text, &s);
            prop_assert!(out.text.contains(&replacement));
            prop_assert!(out.changed_tokens >= 1);
        }

        /// Without a trigger the output is the input plus exactly one fallback.
        #[test]
        fn missing_trigger_appends_one_fallback(s in "[a-zA-Z ,.]{0,80}") {
            prop_assume!(!s.to_lowercase().contains("pneumonia"));
            let mut g = generator(&[("pneumonia", "bronchitis")], &FALLBACKS);
            let out = g.intervene(&s);
            let appended_one = FALLBACKS.iter().any(|f| out == format!("{s} {f}"));
            prop_assert!(appended_one);
        }

        /// Whatever the input, the default table changes at least one token.
        #[test]
        fn default_table_always_changes_a_token(s in "\\PC{0,120}") {
            let out = default_generator().intervene_detailed(&s);
            prop_assert!(token_difference(&s, &out.text) >= 1);
        }
    }
}
