//! Plain-text emotion analysis report.

use std::fmt::Write;

use crate::fusion::FusionReport;
use crate::mapper::MentalHealthProfile;

/// Closing line of every report.
pub const DISCLAIMER: &str = "Note: This is not a clinical diagnosis. Consult a mental health professional.";

/// Render trends, notable changes, average scores and insights.
///
/// The "Notable Changes" section is omitted when there are none.
pub fn render(fusion: &FusionReport, profile: &MentalHealthProfile) -> String {
    let mut out = String::from("Temporal Emotion Trends:\n");
    for trend in &fusion.trends {
        let _ = writeln!(out, "- {trend}");
    }

    let mut changes = fusion.notable_changes().peekable();
    if changes.peek().is_some() {
        out.push_str("\nNotable Changes:\n");
        for change in changes {
            let _ = writeln!(out, "- {change}");
        }
    }

    out.push_str("\nEmotion Scores (Average):\n");
    for (emotion, score) in profile.emotion_scores.iter() {
        let _ = writeln!(out, "{}: {:.1}%", emotion.label(), score * 100.0);
    }

    out.push_str("\nMental Health Insights:\n");
    for insight in &profile.insights {
        let _ = writeln!(out, "- {insight}");
    }

    out.push('\n');
    out.push_str(DISCLAIMER);
    out
}
