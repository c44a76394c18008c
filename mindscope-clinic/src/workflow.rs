//! The clinical workflows: assessment, video assessment, treatment plans,
//! chat and direct generation.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use mindscope_affect::{
    DisabledSpeechToText, EmotionAnalysis, EmotionAnalyzer, MediaTranscoder, SpeechToText, load_wav,
};
use mindscope_rag::Retriever;
use serde_json::Value;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::assessment::{AssessmentRequest, PrescriptionRequest, backfill};
use crate::chat::{ChatRequest, ChatResponse};
use crate::error::{ClinicError, Result};
use crate::gateway::LlmGateway;
use crate::patient::PatientDetails;
use crate::prompt::{AssessmentContext, assessment_prompt, chat_prompt, emotion_summary, treatment_prompt};
use crate::reply::ModelReply;
use crate::validation::{require_text, sanitize_filename, video_extension};

/// Returned alongside a failed assessment or treatment plan.
pub const GENERATION_FAILED_MESSAGE: &str =
    "The clinical report could not be generated right now. Please try again later.";

/// Source of the current time. Dates in prompts and results come from here.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// An uploaded recording.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    /// Client-supplied name; only its extension and a sanitised form are used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl VideoUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }

    /// Read an upload from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(Self { filename, bytes })
    }
}

/// Collaborators needed for video analysis.
#[derive(Clone)]
pub struct MediaPipeline {
    transcoder: Arc<dyn MediaTranscoder>,
    analyzer: Arc<EmotionAnalyzer>,
    speech: Arc<dyn SpeechToText>,
}

impl MediaPipeline {
    /// Combine a transcoder and an analyzer. Speech recognition is disabled
    /// until [`MediaPipeline::with_speech`] is called.
    pub fn new(transcoder: Arc<dyn MediaTranscoder>, analyzer: Arc<EmotionAnalyzer>) -> Self {
        Self { transcoder, analyzer, speech: Arc::new(DisabledSpeechToText) }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechToText>) -> Self {
        self.speech = speech;
        self
    }
}

/// Orchestrates retrieval, prompting, generation and media analysis.
#[derive(Clone)]
pub struct ClinicalPipeline {
    retriever: Retriever,
    gateway: LlmGateway,
    media: Option<MediaPipeline>,
    clock: Arc<dyn Clock>,
}

impl ClinicalPipeline {
    pub fn builder() -> ClinicalPipelineBuilder {
        ClinicalPipelineBuilder::default()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn gateway(&self) -> &LlmGateway {
        &self.gateway
    }

    /// Assessment from caller-supplied emotion estimates.
    pub async fn analyze_emotions(&self, request: AssessmentRequest) -> ModelReply {
        let span = info_span!("clinic.analyze_emotions", request.id = %Uuid::new_v4());
        async move {
            let AssessmentRequest { patient, emotions, history } = request;
            let combined = emotions.combined_emotion.as_str();
            let query = format!(
                "Mental health assessment for patient with {combined} emotion, age {}, gender {}, symptoms for {}",
                patient.age, patient.gender, history.symptom_duration
            );
            let references = self.retriever.retrieve_default(&query, Some(combined)).await;
            info!(references = references.len(), "retrieved assessment context");

            let summary = emotion_summary(
                (emotions.facial_emotion.as_str(), emotions.facial_confidence),
                (emotions.speech_emotion.as_str(), emotions.speech_confidence),
                (combined, emotions.combined_confidence),
            );
            let now = self.clock.now();
            let prompt = assessment_prompt(&AssessmentContext {
                patient: &patient,
                emotion_analysis: &summary,
                transcript: None,
                history: Some(&history),
                references: &references,
                date: now.date_naive(),
            });
            let reply = self.gateway.generate(&prompt).await;
            assessment_envelope(reply, &patient, now, "analysis")
        }
        .instrument(span)
        .await
    }

    /// Assessment of a recorded session.
    ///
    /// The upload is written to a private temporary directory that is removed
    /// on every exit path.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Config`] when no [`MediaPipeline`] is configured
    /// - [`ClinicError::Validation`] for an empty upload or unsupported extension
    /// - [`ClinicError::Affect`] when transcoding, extraction or fusion fails
    pub async fn analyze_video(&self, upload: VideoUpload, patient: PatientDetails) -> Result<ModelReply> {
        let span = info_span!("clinic.analyze_video", request.id = %Uuid::new_v4());
        async move {
            let media = self
                .media
                .as_ref()
                .ok_or_else(|| ClinicError::Config("video analysis is not configured".to_string()))?;
            let extension = video_extension(&upload.filename)?;
            if upload.bytes.is_empty() {
                return Err(ClinicError::validation("No video file provided"));
            }
            info!(extension = %extension, bytes = upload.bytes.len(), "received video for analysis");

            let workspace = tempfile::Builder::new().prefix("mindscope-upload-").tempdir()?;
            let outcome = self.analyze_stored_video(media, workspace.path(), &upload, &patient).await;
            if let Err(e) = workspace.close() {
                warn!(error = %e, "failed to remove temporary upload directory");
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn analyze_stored_video(
        &self,
        media: &MediaPipeline,
        dir: &Path,
        upload: &VideoUpload,
        patient: &PatientDetails,
    ) -> Result<ModelReply> {
        let video_path = dir.join(sanitize_filename(&upload.filename));
        tokio::fs::write(&video_path, &upload.bytes).await?;
        let audio_path = dir.join("audio.wav");

        let transcoder = Arc::clone(&media.transcoder);
        let video = video_path.clone();
        let waveform = tokio::task::spawn_blocking(move || {
            transcoder.extract_audio(&video, &audio_path)?;
            load_wav(&audio_path)
        })
        .await
        .map_err(|e| ClinicError::Task(e.to_string()))?
        .inspect_err(|e| error!(error = %e, "audio extraction failed"))?;
        info!(duration = waveform.duration_seconds(), "audio extracted");

        let analyzer = Arc::clone(&media.analyzer);
        let analysis_audio = waveform.clone();
        let analysis = tokio::task::spawn_blocking(move || analyzer.analyze(&video_path, &analysis_audio));
        let (transcript, analysis) = tokio::join!(media.speech.transcribe(&waveform), analysis);
        let analysis: EmotionAnalysis = analysis.map_err(|e| ClinicError::Task(e.to_string()))??;
        info!(transcribed = transcript.is_transcribed(), "media analysis complete");

        let query = format!("Mental health assessment for patient, age {}, gender {}", patient.age, patient.gender);
        let references = self.retriever.retrieve_default(&query, None).await;

        let now = self.clock.now();
        let prompt = assessment_prompt(&AssessmentContext {
            patient,
            emotion_analysis: &analysis.report,
            transcript: Some(&transcript),
            history: None,
            references: &references,
            date: now.date_naive(),
        });
        let reply = self.gateway.generate(&prompt).await;
        let mut reply = assessment_envelope(reply, patient, now, "analysis");
        reply.insert("emotion_analysis", analysis.report);
        reply.insert("emotion_insights", analysis.profile.insights);
        reply.insert("transcribed_text", transcript.as_text());
        Ok(reply)
    }

    /// Treatment plan for a prior assessment.
    pub async fn generate_prescription(&self, request: PrescriptionRequest) -> ModelReply {
        let span = info_span!("clinic.generate_prescription", request.id = %Uuid::new_v4());
        async move {
            let patient = &request.patient;
            let query = format!(
                "Treatment recommendations for {} patient, age {}, gender {}",
                request.condition(),
                patient.age,
                patient.gender
            );
            let references = self.retriever.retrieve_default(&query, None).await;

            let now = self.clock.now();
            let prompt = treatment_prompt(patient, &request.mental_assessment, &references, now.date_naive());
            let mut reply = self.gateway.generate(&prompt).await;

            if let Some(message) = reply.error_message().map(str::to_string) {
                error!(error = %message, "treatment plan generation failed");
                reply.insert("error", format!("Failed to generate prescription: {message}"));
                reply.insert("message", GENERATION_FAILED_MESSAGE);
            } else if let Some(condition) = request.mental_assessment.get("condition") {
                reply.insert("condition", condition.clone());
            }
            reply.insert("patient_information", patient.information(None));
            reply.insert("generation_date", now.format("%Y-%m-%d").to_string());
            reply
        }
        .instrument(span)
        .await
    }

    /// A supportive chat reply.
    ///
    /// # Errors
    ///
    /// [`ClinicError::Validation`] when the message is blank. Generation
    /// failures produce an apology in the response instead.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let span = info_span!("clinic.chat", request.id = %Uuid::new_v4());
        async move {
            let message = require_text("Message content", &request.message)?;
            let history = request.recent_history();
            info!(user = %request.user_name, history = history.len(), "processing chat message");

            let references = self.retriever.retrieve_default(message, request.emotion.as_deref()).await;
            let now = self.clock.now();
            let prompt = chat_prompt(&request.user_name, message, &history, &references, now.date_naive());
            let reply = self.gateway.generate(&prompt).await;
            Ok(ChatResponse::from_reply(reply, now.to_rfc3339()))
        }
        .instrument(span)
        .await
    }

    /// Send `prompt` to the gateway unchanged.
    pub async fn generate_raw(&self, prompt: &str) -> Result<ModelReply> {
        let prompt = require_text("Prompt", prompt)?;
        let span = info_span!("clinic.generate_raw", request.id = %Uuid::new_v4());
        Ok(self.gateway.generate(prompt).instrument(span).await)
    }
}

fn assessment_envelope(
    mut reply: ModelReply,
    patient: &PatientDetails,
    now: DateTime<Local>,
    what: &str,
) -> ModelReply {
    if let Some(message) = reply.error_message().map(str::to_string) {
        error!(error = %message, what, "assessment generation failed");
        reply.insert("error", format!("Failed to generate {what}: {message}"));
        reply.insert("message", GENERATION_FAILED_MESSAGE);
    }
    backfill(&mut reply, patient, now.date_naive());
    reply.insert("timestamp", Value::String(now.to_rfc3339()));
    reply
}

/// Builder for [`ClinicalPipeline`].
#[derive(Default)]
pub struct ClinicalPipelineBuilder {
    retriever: Option<Retriever>,
    gateway: Option<LlmGateway>,
    media: Option<MediaPipeline>,
    clock: Option<Arc<dyn Clock>>,
}

impl ClinicalPipelineBuilder {
    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn gateway(mut self, gateway: LlmGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Enable [`ClinicalPipeline::analyze_video`].
    pub fn media(mut self, media: MediaPipeline) -> Self {
        self.media = Some(media);
        self
    }

    /// Replace the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ClinicalPipeline> {
        Ok(ClinicalPipeline {
            retriever: self.retriever.ok_or_else(|| ClinicError::Config("a retriever is required".to_string()))?,
            gateway: self.gateway.ok_or_else(|| ClinicError::Config("a gateway is required".to_string()))?,
            media: self.media,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}
