//! Heuristic mapping from fused emotions to mental-health insights.

use serde::{Deserialize, Serialize};

use crate::emotion::{Emotion, EmotionVector};
use crate::fusion::FusedSegment;

/// Emitted when no heuristic fires.
pub const NO_INDICATORS: &str = "No clear mental health indicators detected.";

/// Average emotion scores and the insights they trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentalHealthProfile {
    /// Mean probability per label across all segments.
    pub emotion_scores: EmotionVector,
    /// Insights in rule order. Never empty.
    pub insights: Vec<String>,
}

/// Average the segments and apply [`insights_for`].
pub fn map(segments: &[FusedSegment]) -> MentalHealthProfile {
    let vectors: Vec<EmotionVector> = segments.iter().map(|s| s.emotion_vector).collect();
    let emotion_scores = EmotionVector::mean(&vectors).unwrap_or(EmotionVector::ZERO);
    MentalHealthProfile { insights: insights_for(&emotion_scores), emotion_scores }
}

/// The fixed clinical heuristics, applied in order.
pub fn insights_for(scores: &EmotionVector) -> Vec<String> {
    let sad = scores.get(Emotion::Sad);
    let neutral = scores.get(Emotion::Neutral);
    let fear = scores.get(Emotion::Fear);
    let angry = scores.get(Emotion::Angry);
    let happy = scores.get(Emotion::Happy);
    let surprise = scores.get(Emotion::Surprise);

    let mut insights = Vec::new();
    if sad > 0.5 || sad + neutral > 0.7 {
        insights.push(format!("Potential low mood detected ({:.1}% sadness)", sad * 100.0));
    }
    if fear > 0.4 || angry > 0.4 {
        insights.push(format!("Potential anxiety detected ({:.1}% confidence)", fear.max(angry) * 100.0));
    }
    if happy > 0.6 {
        insights.push(format!("Positive mental state detected ({:.1}% happiness)", happy * 100.0));
    }
    if surprise > 0.4 {
        insights.push(format!("Possible emotional reactivity detected ({:.1}% surprise)", surprise * 100.0));
    }
    if insights.is_empty() {
        insights.push(NO_INDICATORS.to_string());
    }
    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(Emotion, f32)]) -> EmotionVector {
        let mut values = [0.0; 7];
        for (emotion, value) in pairs {
            values[emotion.index()] = *value;
        }
        EmotionVector::new(values)
    }

    #[test]
    fn sadness_triggers_low_mood() {
        let insights = insights_for(&scores(&[(Emotion::Sad, 0.6), (Emotion::Neutral, 0.1)]));
        assert_eq!(insights, vec!["Potential low mood detected (60.0% sadness)"]);
    }

    #[test]
    fn sad_plus_neutral_triggers_low_mood() {
        let insights = insights_for(&scores(&[(Emotion::Sad, 0.3), (Emotion::Neutral, 0.45)]));
        assert!(insights[0].starts_with("Potential low mood detected"));
    }

    #[test]
    fn happiness_is_positive_without_low_mood() {
        let insights = insights_for(&scores(&[(Emotion::Happy, 0.7), (Emotion::Neutral, 0.1)]));
        assert_eq!(insights, vec!["Positive mental state detected (70.0% happiness)"]);
    }

    #[test]
    fn anxiety_reports_the_larger_channel() {
        let insights = insights_for(&scores(&[(Emotion::Fear, 0.3), (Emotion::Angry, 0.45)]));
        assert_eq!(insights, vec!["Potential anxiety detected (45.0% confidence)"]);
    }

    #[test]
    fn rules_fire_in_order() {
        let insights = insights_for(&scores(&[(Emotion::Sad, 0.55), (Emotion::Surprise, 0.45)]));
        assert_eq!(insights.len(), 2);
        assert!(insights[0].contains("low mood"));
        assert!(insights[1].contains("reactivity"));
    }

    #[test]
    fn thresholds_are_strict() {
        let insights = insights_for(&scores(&[(Emotion::Sad, 0.5), (Emotion::Fear, 0.4)]));
        assert_eq!(insights, vec![NO_INDICATORS]);
    }

    #[test]
    fn no_segments_means_no_indicators() {
        let profile = map(&[]);
        assert_eq!(profile.insights, vec![NO_INDICATORS]);
    }
}
