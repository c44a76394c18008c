//! The assessment schema and its back-filling rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::patient::PatientDetails;
pub use crate::reply::LIST_FIELDS;
use crate::reply::ModelReply;

/// Text fields of an assessment, defaulted to [`NOT_PROVIDED`]. List fields
/// ([`LIST_FIELDS`]) default to `[]`.
pub const TEXT_FIELDS: [&str; 7] = [
    "mental_health_assessment",
    "differential_diagnosis",
    "condition",
    "severity",
    "follow_up",
    "risk_assessment",
    "prognosis",
];

/// Placeholder for text fields the model left out.
pub const NOT_PROVIDED: &str = "Not provided";

/// Fill every missing schema field so downstream rendering sees the full shape.
///
/// Values the model did provide are kept. `patient_information` is added
/// from `patient` when absent.
pub fn backfill(reply: &mut ModelReply, patient: &PatientDetails, date: NaiveDate) {
    for field in TEXT_FIELDS {
        reply.insert_missing(field, || json!(NOT_PROVIDED));
    }
    for field in LIST_FIELDS {
        reply.insert_missing(field, || json!([]));
    }
    reply.insert_missing("patient_information", || patient.information(Some(date)));
}

/// Caller-supplied emotion estimates for a text-only assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSnapshot {
    #[serde(default = "unknown")]
    pub facial_emotion: String,
    #[serde(default)]
    pub facial_confidence: f64,
    #[serde(default = "unknown")]
    pub speech_emotion: String,
    #[serde(default)]
    pub speech_confidence: f64,
    #[serde(default = "unknown")]
    pub combined_emotion: String,
    #[serde(default)]
    pub combined_confidence: f64,
}

fn unknown() -> String {
    "Unknown".to_string()
}

impl Default for EmotionSnapshot {
    fn default() -> Self {
        Self {
            facial_emotion: unknown(),
            facial_confidence: 0.0,
            speech_emotion: unknown(),
            speech_confidence: 0.0,
            combined_emotion: unknown(),
            combined_confidence: 0.0,
        }
    }
}

/// Clinician-reported history accompanying a text-only assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomHistory {
    #[serde(default = "unknown")]
    pub symptom_duration: String,
    #[serde(default)]
    pub additional_notes: String,
}

impl Default for SymptomHistory {
    fn default() -> Self {
        Self { symptom_duration: unknown(), additional_notes: String::new() }
    }
}

/// Request for [`crate::ClinicalPipeline::analyze_emotions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    #[serde(flatten)]
    pub patient: PatientDetails,
    #[serde(flatten)]
    pub emotions: EmotionSnapshot,
    #[serde(flatten)]
    pub history: SymptomHistory,
}

/// Request for [`crate::ClinicalPipeline::generate_prescription`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRequest {
    #[serde(flatten)]
    pub patient: PatientDetails,
    /// A prior assessment, usually the output of an analysis workflow.
    #[serde(default)]
    pub mental_assessment: serde_json::Map<String, Value>,
}

impl PrescriptionRequest {
    /// The condition to plan for: `condition`, else `differential_diagnosis`, else empty.
    pub fn condition(&self) -> &str {
        let field = |key: &str| self.mental_assessment.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
        field("condition").or_else(|| field("differential_diagnosis")).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn empty_reply_gets_every_field() {
        let mut reply = ModelReply::default();
        backfill(&mut reply, &PatientDetails::default(), date());
        for field in TEXT_FIELDS {
            assert_eq!(reply.get_str(field), Some(NOT_PROVIDED), "{field}");
        }
        for field in LIST_FIELDS {
            assert_eq!(reply.get(field), Some(&json!([])), "{field}");
        }
        assert_eq!(reply.get("patient_information").unwrap()["assessment_date"], "2025-03-07");
    }

    #[test]
    fn provided_values_survive() {
        let mut reply = ModelReply::parse(
            r#"{"condition": "MDD", "recommendations": ["Exercise"], "patient_information": {"name": "X"}}"#,
        );
        backfill(&mut reply, &PatientDetails::new("Sam", "41", "female"), date());
        assert_eq!(reply.get_str("condition"), Some("MDD"));
        assert_eq!(reply.get("recommendations"), Some(&json!(["Exercise"])));
        assert_eq!(reply.get("patient_information"), Some(&json!({"name": "X"})));
    }

    #[test]
    fn request_fields_are_flat() {
        let request: AssessmentRequest = serde_json::from_str(
            r#"{"name": "Sam", "age": "41", "combined_emotion": "sad", "combined_confidence": 0.7}"#,
        )
        .unwrap();
        assert_eq!(request.patient.gender, "Unknown");
        assert_eq!(request.emotions.combined_emotion, "sad");
        assert_eq!(request.emotions.facial_emotion, "Unknown");
        assert_eq!(request.history, SymptomHistory::default());
    }

    #[test]
    fn symptom_history_is_read_from_the_request() {
        let request: AssessmentRequest = serde_json::from_str(
            r#"{"symptom_duration": "3 months", "additional_notes": "Recent job loss"}"#,
        )
        .unwrap();
        assert_eq!(request.history.symptom_duration, "3 months");
        assert_eq!(request.history.additional_notes, "Recent job loss");
    }

    #[test]
    fn prescription_condition_falls_back_to_differential() {
        let request: PrescriptionRequest = serde_json::from_str(
            r#"{"mental_assessment": {"condition": "", "differential_diagnosis": "GAD vs panic disorder"}}"#,
        )
        .unwrap();
        assert_eq!(request.condition(), "GAD vs panic disorder");
        assert_eq!(PrescriptionRequest::default().condition(), "");
    }
}
