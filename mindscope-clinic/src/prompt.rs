//! Prompt composition for assessments, treatment plans and chat.
//!
//! Every function is pure: the date is passed in, so the same inputs always
//! render the same prompt.

use std::fmt::Write;

use chrono::NaiveDate;
use mindscope_affect::TranscriptOutcome;
use mindscope_rag::RetrievalResult;
use serde_json::{Map, Value};

use crate::assessment::SymptomHistory;
use crate::chat::Role;
use crate::patient::PatientDetails;

/// `"March 07, 2025"`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// Render retrieved references, most relevant first.
///
/// Each reference is numbered and tagged with its topics and question id.
/// Returns an empty string when there are no references.
pub fn format_rag_context(references: &[RetrievalResult]) -> String {
    if references.is_empty() {
        return String::new();
    }
    let mut ranked: Vec<&RetrievalResult> = references.iter().collect();
    ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let mut out = String::from("RELEVANT CLINICAL KNOWLEDGE BASE INFORMATION:\n");
    for (i, reference) in ranked.iter().enumerate() {
        let metadata = &reference.metadata;
        let _ = write!(out, "Reference {}", i + 1);
        if !metadata.topics.is_empty() {
            let _ = write!(out, " [Topics: {}]", metadata.topic_list());
        }
        if !metadata.question_id.is_empty() {
            let _ = write!(out, " [Question ID: {}]", metadata.question_id);
        }
        let _ = write!(out, ":\n{}\n\n", reference.content);
    }
    out
}

const ASSESSMENT_CONTRACT: &str = r#"```json
{
    "mental_health_assessment": "Detailed clinical formulation including observed patterns and their significance",
    "differential_diagnosis": "Primary and alternative diagnostic considerations with clear DSM-5 reasoning",
    "condition": "Most likely clinical condition based on available data",
    "severity": "Mild/Moderate/Severe/Subclinical",
    "recommendations": ["Evidence-based recommendations for non-pharmacological interventions"],
    "therapy_options": ["Specific psychotherapy approaches with brief rationale for each"],
    "medication_considerations": ["Classes of medications that might be considered, with cautionary notes about evaluation needed"],
    "follow_up": "Recommended follow-up timeline and assessments",
    "risk_assessment": "Any noted risk factors requiring monitoring",
    "prognosis": "Expected course with appropriate treatment"
}
```"#;

/// Inputs of the initial assessment prompt.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentContext<'a> {
    pub patient: &'a PatientDetails,
    /// Either the rendered fusion report or a one-line emotion summary.
    pub emotion_analysis: &'a str,
    /// `None` when no recording was analysed.
    pub transcript: Option<&'a TranscriptOutcome>,
    /// Reported symptom duration and notes, when the caller supplied them.
    pub history: Option<&'a SymptomHistory>,
    pub references: &'a [RetrievalResult],
    pub date: NaiveDate,
}

/// The psychiatric assessment prompt.
pub fn assessment_prompt(ctx: &AssessmentContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Psychiatric Assessment Protocol\n");
    let _ = writeln!(
        out,
        "You are Dr. Morgan Chen, a board-certified psychiatrist with 15 years of clinical experience \
         specializing in mood and anxiety disorders. You are conducting a psychiatric assessment based on \
         multimodal emotional analysis data and patient history. Today is {}.\n",
        long_date(ctx.date)
    );

    let _ = writeln!(out, "## PATIENT DATA\n");
    let _ = writeln!(out, "- **Name**: {}", ctx.patient.name);
    let _ = writeln!(out, "- **Age**: {}", ctx.patient.age);
    match ctx.history {
        Some(history) => {
            let _ = writeln!(out, "- **Gender**: {}", ctx.patient.gender);
            let _ = writeln!(out, "- **Symptom Duration**: {}", history.symptom_duration);
            let _ = writeln!(out, "- **Clinical Notes**: {}\n", history.additional_notes);
        }
        None => {
            let _ = writeln!(out, "- **Gender**: {}\n", ctx.patient.gender);
        }
    }

    let _ = writeln!(out, "### Emotional Analysis Results\n");
    let _ = writeln!(out, "{}\n", ctx.emotion_analysis.trim_end());

    if let Some(transcript) = ctx.transcript {
        let _ = writeln!(out, "### Patient Speech Transcript\n");
        let _ = writeln!(out, "{transcript}\n");
    }

    let _ = writeln!(out, "## CLINICAL KNOWLEDGE BASE REFERENCES\n");
    let _ = writeln!(out, "{}", format_rag_context(ctx.references));

    out.push_str(
        "## ASSESSMENT FRAMEWORK\n\n\
         1. **Initial Evaluation**: Synthesize the emotional data, noting congruence or incongruence between \
         facial expressions, vocal tone and spoken content.\n\
         2. **Pattern Recognition**: Map emotional patterns to diagnostic considerations:\n\
         \x20  - Persistent sadness/low mood: depressive disorders\n\
         \x20  - Elevated anxiety/fear: anxiety spectrum disorders\n\
         \x20  - Emotional dysregulation/mood swings: bipolar spectrum, borderline traits\n\
         \x20  - Emotional numbing/restricted affect: PTSD, dissociative disorders\n\
         3. **Clinical Reasoning**: Apply DSM-5 criteria to formulate differential diagnoses.\n\
         4. **Severity Assessment**: Weigh chronicity, functional impact and threshold criteria.\n\
         5. **Treatment Planning**: Recommend evidence-based psychotherapy, medication classes if indicated, \
         lifestyle interventions and follow-up.\n\n",
    );

    out.push_str("## CLINICAL OUTPUT FORMAT\n\nProvide a comprehensive psychiatric assessment in JSON format:\n\n");
    out.push_str(ASSESSMENT_CONTRACT);
    out.push_str(
        "\n\nMaintain clinical precision and professional language while conveying a thoughtful \
         understanding of the patient's experience.\n",
    );
    out
}

/// One-line summary of caller-supplied emotion estimates.
pub fn emotion_summary(
    facial: (&str, f64),
    speech: (&str, f64),
    combined: (&str, f64),
) -> String {
    format!(
        "Facial Emotion: {} (Confidence: {:.2}), Speech Emotion: {} (Confidence: {:.2}), \
         Combined Emotion: {} (Confidence: {:.2})",
        facial.0, facial.1, speech.0, speech.1, combined.0, combined.1
    )
}

/// The treatment plan prompt, embedding a prior assessment.
pub fn treatment_prompt(
    patient: &PatientDetails,
    assessment: &Map<String, Value>,
    references: &[RetrievalResult],
    date: NaiveDate,
) -> String {
    let condition = assessment.get("condition").and_then(Value::as_str).filter(|c| !c.is_empty());
    let severity = assessment.get("severity").and_then(Value::as_str).unwrap_or("Unknown");
    let today = long_date(date);
    let summary = serde_json::to_string_pretty(assessment).unwrap_or_else(|_| "{}".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "# Psychiatric Treatment Plan Documentation\n");
    let _ = writeln!(
        out,
        "You are Dr. Morgan Chen, MD, PhD, a board-certified psychiatrist specializing in {}. \
         You are preparing a treatment plan following your psychiatric assessment. Today is {today}.\n",
        condition.unwrap_or("mood and anxiety disorders")
    );

    let _ = writeln!(out, "## PATIENT INFORMATION\n");
    let _ = writeln!(out, "- **Name**: {}", patient.name);
    let _ = writeln!(out, "- **Age**: {}", patient.age);
    let _ = writeln!(out, "- **Gender**: {}", patient.gender);
    let _ = writeln!(out, "- **Assessment Date**: {today}\n");

    let _ = writeln!(out, "## CLINICAL ASSESSMENT SUMMARY\n\n{summary}\n");
    let _ = writeln!(out, "## EVIDENCE-BASED TREATMENT REFERENCES\n");
    let _ = writeln!(out, "{}", format_rag_context(references));

    let _ = writeln!(
        out,
        "## TREATMENT PLAN FRAMEWORK\n\n\
         1. **Clinical Formulation**: Synthesize the findings from a biopsychosocial perspective.\n\
         2. **Diagnostic Impression**: Use DSM-5 codes and categories.\n\
         3. **Treatment Planning**: Use a stepped care approach based on severity ({severity}), considering \
         age ({}) and gender ({}), with measurable goals.\n\
         4. **Care Components**: Psychotherapy modality and frequency; medication classes only (NOT specific \
         medications or dosages); psychosocial interventions; self-management strategies.\n\
         5. **Continuity of Care**: Follow-up schedule, outcome measures, escalation criteria and crisis plan.\n",
        patient.age, patient.gender
    );

    let _ = writeln!(out, "## OUTPUT FORMAT\n\nPresent the treatment plan as a JSON object:\n");
    let _ = writeln!(
        out,
        r#"```json
{{
    "prescription_title": "Comprehensive Mental Health Treatment Plan",
    "patient_details": {{
        "name": "{name}",
        "age": "{age}",
        "gender": "{gender}",
        "assessment_date": "{today}"
    }},
    "clinical_formulation": "Integrative understanding of the patient's presentation",
    "diagnosis": {{
        "primary": "Primary diagnosis with DSM-5 category and code",
        "differential": "Alternative diagnoses to consider",
        "contributing_factors": ["Psychosocial factors influencing presentation"]
    }},
    "treatment_plan": {{
        "immediate_recommendations": ["Urgent interventions if needed"],
        "psychotherapy": "Therapy approach with empirical rationale and expected timeline",
        "medication_considerations": "General medication classes that may be considered pending full evaluation",
        "lifestyle_modifications": ["Specific behavioral changes recommended"],
        "self_care_strategies": ["Evidence-based coping skills and wellness practices"]
    }},
    "monitoring_plan": {{
        "follow_up": "Follow-up schedule with specific timeframes",
        "assessment_tools": ["Standardized measures to track progress"],
        "warning_signs": ["Symptoms requiring prompt clinical attention"],
        "treatment_milestones": ["Expected progress indicators"]
    }},
    "additional_resources": ["Support groups, educational materials, etc."],
    "provider_notes": "Additional clinical considerations for the healthcare team"
}}
```"#,
        name = patient.name,
        age = patient.age,
        gender = patient.gender,
    );
    out
}

const CHAT_CONTRACT: &str = r#"```json
{
    "message": "Your complete reply to the user, written as one warm, natural message",
    "validation_and_empathy": "How you acknowledged and validated their feelings",
    "therapeutic_insight": "The psychological insight or reframe you offered",
    "practical_support": "Concrete coping strategies or next steps you suggested",
    "reflection_and_exploration": "The reflective question you asked",
    "invitation_to_continue": "How you invited them to keep talking"
}
```"#;

/// The supportive conversation prompt.
pub fn chat_prompt(
    user_name: &str,
    message: &str,
    history: &[(Role, &str)],
    references: &[RetrievalResult],
    date: NaiveDate,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Supportive Mental Health Conversation\n");
    let _ = writeln!(
        out,
        "You are Dr. Morgan Chen, a compassionate psychiatrist offering supportive conversation to {user_name}. \
         Today is {}. You are not a replacement for emergency services: if the user mentions self-harm or \
         danger to others, urge them to contact local emergency services or a crisis line immediately.\n",
        long_date(date)
    );

    if !history.is_empty() {
        let _ = writeln!(out, "## CONVERSATION SO FAR\n");
        for (role, content) in history {
            let _ = writeln!(out, "{}: {}", role.as_str(), content);
        }
        out.push('\n');
    }

    let context = format_rag_context(references);
    if !context.is_empty() {
        let _ = writeln!(out, "## CLINICAL KNOWLEDGE BASE REFERENCES\n\n{context}");
    }

    let _ = writeln!(out, "## CURRENT MESSAGE\n\n{user_name}: {message}\n");
    out.push_str(
        "## RESPONSE GUIDELINES\n\n\
         Validate their feelings, offer one grounded insight, suggest practical support, ask a reflective \
         question and invite them to continue. Keep the tone warm and plain-spoken.\n\n\
         Respond with a JSON object:\n\n",
    );
    out.push_str(CHAT_CONTRACT);
    out.push('\n');
    out
}
