//! Patient identification carried through every workflow.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Name, age and gender as supplied by the caller.
///
/// Values are free text; absent ones take placeholder defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDetails {
    #[serde(default = "default_name", alias = "patient_name")]
    pub name: String,
    #[serde(default = "unknown", alias = "patient_age")]
    pub age: String,
    #[serde(default = "unknown", alias = "patient_gender")]
    pub gender: String,
}

fn default_name() -> String {
    "Anonymous Patient".to_string()
}

fn unknown() -> String {
    "Unknown".to_string()
}

impl Default for PatientDetails {
    fn default() -> Self {
        Self { name: default_name(), age: unknown(), gender: unknown() }
    }
}

impl PatientDetails {
    pub fn new(name: impl Into<String>, age: impl Into<String>, gender: impl Into<String>) -> Self {
        Self { name: name.into(), age: age.into(), gender: gender.into() }
    }

    /// The `patient_information` object attached to assessments.
    pub fn information(&self, assessment_date: Option<NaiveDate>) -> Value {
        let mut info = json!({
            "name": self.name,
            "age": self.age,
            "gender": self.gender,
        });
        if let (Some(date), Some(map)) = (assessment_date, info.as_object_mut()) {
            map.insert("assessment_date".to_string(), json!(date.format("%Y-%m-%d").to_string()));
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_placeholders() {
        let patient: PatientDetails = serde_json::from_str(r#"{"age": "34"}"#).unwrap();
        assert_eq!(patient, PatientDetails::new("Anonymous Patient", "34", "Unknown"));
        let patient: PatientDetails = serde_json::from_str(r#"{"patient_gender": "male"}"#).unwrap();
        assert_eq!(patient.gender, "male");
    }

    #[test]
    fn information_includes_date_when_given() {
        let patient = PatientDetails::new("Sam", "41", "female");
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            patient.information(Some(date)),
            json!({"name": "Sam", "age": "41", "gender": "female", "assessment_date": "2025-03-07"})
        );
        assert!(patient.information(None).get("assessment_date").is_none());
    }
}
