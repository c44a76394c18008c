//! Keyword rules that tag Q&A pairs with clinical topics.

use std::collections::BTreeSet;

/// Topic assigned when no rule matches.
pub const GENERAL_TOPIC: &str = "mental health general";

/// Clinical conditions and the keywords that indicate them.
pub const CONDITION_KEYWORDS: &[(&str, &[&str])] = &[
    ("depression", &["depression", "depressive", "mdd", "sad", "low mood"]),
    ("anxiety", &["anxiety", "anxious", "worry", "panic", "gad", "phobia"]),
    ("bipolar", &["bipolar", "mania", "manic", "mood swing"]),
    ("schizophrenia", &["schizophrenia", "psychosis", "psychotic", "hallucination", "delusion"]),
    ("addiction", &["addiction", "substance", "alcohol", "drug abuse"]),
    ("adhd", &["adhd", "attention deficit", "hyperactive", "inattentive"]),
    ("trauma", &["trauma", "ptsd", "abuse"]),
    ("personality disorder", &["personality disorder", "borderline", "narcissistic"]),
    ("ocd", &["ocd", "obsessive", "compulsive"]),
    ("eating disorder", &["eating disorder", "anorexia", "bulimia", "binge"]),
];

/// Treatment categories and the keywords that indicate them.
pub const TREATMENT_KEYWORDS: &[(&str, &[&str])] = &[
    ("therapy", &["therapy", "psychotherapy", "counseling", "cbt", "dbt"]),
    ("medication", &["medication", "medicine", "antidepressant", "ssri", "drug"]),
    ("self-help", &["self-help", "coping", "exercise", "meditation", "mindfulness"]),
    ("diagnosis", &["diagnosis", "assessment", "test", "symptom", "sign"]),
];

/// Tag a question/answer pair. The result is never empty.
///
/// Keywords are matched as case-insensitive substrings of
/// `question + " " + answer`, so `"sad"` also fires on `"saddened"`.
pub fn tag(question: &str, answer: &str) -> BTreeSet<String> {
    let haystack = format!("{question} {answer}").to_lowercase();
    let mut topics: BTreeSet<String> = CONDITION_KEYWORDS
        .iter()
        .chain(TREATMENT_KEYWORDS)
        .filter(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(topic, _)| (*topic).to_string())
        .collect();

    if topics.is_empty() {
        topics.insert(GENERAL_TOPIC.to_string());
    }
    topics
}
