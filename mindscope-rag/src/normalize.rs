//! Deterministic text cleanup shared by indexing and querying.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("static pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern is valid"));

/// Lowercase `text`, blank out punctuation, collapse whitespace and trim.
///
/// Total and idempotent: `normalize(&normalize(x)) == normalize(x)` for every
/// input, and empty or punctuation-only input yields an empty string.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// The distinct whitespace-separated terms of `normalize(text)`.
pub fn terms(text: &str) -> BTreeSet<String> {
    normalize(text).split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_punctuation_and_case() {
        assert_eq!(normalize("  What is  ANXIETY?!  "), "what is anxiety");
        assert_eq!(normalize("self-help, CBT & DBT"), "self help cbt dbt");
    }

    #[test]
    fn keeps_underscores_and_digits() {
        assert_eq!(normalize("Question_ID 42."), "question_id 42");
    }

    #[test]
    fn empty_and_punctuation_only_inputs_are_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!...,;"), "");
        assert_eq!(normalize(" \t\n "), "");
    }

    #[test]
    fn terms_are_deduplicated() {
        let t = terms("Worry, worry and more WORRY");
        assert_eq!(t.len(), 3);
        assert!(t.contains("worry"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in any::<String>()) {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once.clone());
            prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
            prop_assert!(!once.contains("  "));
        }
    }
}
