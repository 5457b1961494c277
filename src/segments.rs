use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

/// Lowercased unicode word tokens.
pub fn word_tokens(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Number of tokens that appear in one text but not the other, counted as a
/// multiset symmetric difference. Zero means the texts are token-identical.
pub fn token_difference(a: &str, b: &str) -> usize {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for t in word_tokens(a) {
        *counts.entry(t).or_default() += 1;
    }
    for t in word_tokens(b) {
        *counts.entry(t).or_default() -= 1;
    }
    counts.values().map(|c| c.unsigned_abs() as usize).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_ignore_punctuation_and_case() {
        let t = word_tokens("Patient diagnosed with Pneumonia, started on antibiotics.");
        assert_eq!(t, vec!["patient", "diagnosed", "with", "pneumonia", "started", "on", "antibiotics"]);
    }

    #[test]
    fn difference_counts_added_and_removed_tokens() {
        assert_eq!(token_difference("low hemoglobin", "low hemoglobin"), 0);
        assert_eq!(token_difference("unsuccessful repair", "successful repair"), 2);
        assert_eq!(token_difference("", "Diet changed."), 2);
    }
}
