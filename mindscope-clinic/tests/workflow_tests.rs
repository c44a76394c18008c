//! Workflow tests against a small on-disk corpus and scripted models.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use image::RgbImage;
use mindscope_affect::{
    DecodedVideo, Emotion, EmotionAnalyzer, FaceBox, FaceDetector, FaceEmotionClassifier,
    FaceExtractorConfig, FacialEmotionExtractor, MediaTranscoder, SpeechToText, TranscriptOutcome,
    VideoDecoder, VoiceEmotionClassifier, VoiceEmotionExtractor, VoiceExtractorConfig, Waveform,
};
use mindscope_clinic::{
    APOLOGY, AssessmentRequest, ChatRequest, ChatTurn, ClinicError, ClinicalPipeline, FixedClock,
    GENERATION_FAILED_MESSAGE, GenerationConfig, GenerativeModel, LlmGateway, MediaPipeline,
    NOT_PROVIDED, PatientDetails, PrescriptionRequest, VideoUpload,
};
use mindscope_rag::{
    CsvCorpus, HashingEmbedder, IndexHandle, LexicalOverlapReranker, Reranker, RetrievalResult, Retriever,
};
use serde_json::json;
use tempfile::TempDir;

const CORPUS: &str = "Question_ID,Questions,Answers\n\
1,What is depression?,Depression is a persistent low mood that affects sleep and appetite.\n\
2,How can I manage anxiety?,Breathing exercises and cognitive behavioural therapy help with anxiety and worry.\n\
3,What helps with trouble sleeping?,Keeping a regular sleep schedule improves insomnia.\n";

/// Returns a fixed reply and records every prompt.
struct Scripted {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn replying(raw: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(raw.to_string()), prompts: Mutex::new(Vec::new()) })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self { reply: Err(message.to_string()), prompts: Mutex::new(Vec::new()) })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeModel for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> mindscope_clinic::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .map_err(|message| ClinicError::Model { model: "scripted".into(), message })
    }
}

struct Fixture {
    _dir: TempDir,
    retriever: Retriever,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("corpus.csv");
    std::fs::write(&csv, CORPUS).unwrap();
    let handle = IndexHandle::builder()
        .source(Arc::new(CsvCorpus::new(csv)))
        .embedder(Arc::new(HashingEmbedder::default()))
        .build()
        .unwrap();
    Fixture { _dir: dir, retriever: Retriever::new(Arc::new(handle)) }
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Local.with_ymd_and_hms(2025, 3, 7, 10, 30, 0).unwrap()))
}

fn pipeline(fixture: &Fixture, model: Arc<Scripted>) -> ClinicalPipeline {
    ClinicalPipeline::builder()
        .retriever(fixture.retriever.clone())
        .gateway(LlmGateway::new(model))
        .clock(clock())
        .build()
        .unwrap()
}

#[tokio::test]
async fn emotion_assessment_is_backfilled_and_dated() {
    let fixture = fixture();
    let model = Scripted::replying(
        "```json\n{\"condition\": \"Major depressive disorder\", \"recommendations\": \"Behavioural activation\"}\n```",
    );
    let pipeline = pipeline(&fixture, model.clone());

    let request: AssessmentRequest = serde_json::from_value(json!({
        "name": "Sam",
        "age": "41",
        "gender": "female",
        "facial_emotion": "sad",
        "facial_confidence": 0.81,
        "combined_emotion": "sad",
        "combined_confidence": 0.7
    }))
    .unwrap();
    let reply = pipeline.analyze_emotions(request).await;

    assert_eq!(reply.get_str("condition"), Some("Major depressive disorder"));
    assert_eq!(reply.get("recommendations"), Some(&json!(["Behavioural activation"])));
    assert_eq!(reply.get("therapy_options"), Some(&json!([])));
    assert_eq!(reply.get_str("prognosis"), Some(NOT_PROVIDED));
    assert_eq!(
        reply.get("patient_information"),
        Some(&json!({"name": "Sam", "age": "41", "gender": "female", "assessment_date": "2025-03-07"}))
    );
    assert!(reply.get_str("timestamp").unwrap().starts_with("2025-03-07T10:30:00"));

    let prompt = model.last_prompt();
    assert!(prompt.contains("Today is March 07, 2025."));
    assert!(prompt.contains("Facial Emotion: sad (Confidence: 0.81)"));
    assert!(prompt.contains("Speech Emotion: Unknown (Confidence: 0.00)"));
    assert!(prompt.contains("RELEVANT CLINICAL KNOWLEDGE BASE INFORMATION:"));
    assert!(!prompt.contains("Patient Speech Transcript"));
}

/// Records the queries it is asked to rerank.
#[derive(Default)]
struct QueryLog(Mutex<Vec<String>>);

#[async_trait]
impl Reranker for QueryLog {
    async fn rerank(&self, query: &str, results: Vec<RetrievalResult>) -> mindscope_rag::Result<Vec<RetrievalResult>> {
        self.0.lock().unwrap().push(query.to_string());
        LexicalOverlapReranker.rerank(query, results).await
    }
}

#[tokio::test]
async fn symptom_history_reaches_query_and_prompt() {
    let fixture = fixture();
    let queries = Arc::new(QueryLog::default());
    let model = Scripted::replying("{}");
    let pipeline = ClinicalPipeline::builder()
        .retriever(fixture.retriever.clone().with_reranker(queries.clone()))
        .gateway(LlmGateway::new(model.clone()))
        .clock(clock())
        .build()
        .unwrap();

    let request: AssessmentRequest = serde_json::from_value(json!({
        "age": "29",
        "gender": "male",
        "combined_emotion": "fear",
        "symptom_duration": "3 months",
        "additional_notes": "Avoids crowded places"
    }))
    .unwrap();
    pipeline.analyze_emotions(request).await;

    assert_eq!(
        queries.0.lock().unwrap().as_slice(),
        ["Mental health assessment for patient with fear emotion, age 29, gender male, symptoms for 3 months \
          related to fear emotion"]
    );
    let prompt = model.last_prompt();
    assert!(prompt.contains("- **Symptom Duration**: 3 months"));
    assert!(prompt.contains("- **Clinical Notes**: Avoids crowded places"));
}

#[tokio::test]
async fn missing_symptom_history_defaults_to_unknown() {
    let fixture = fixture();
    let model = Scripted::replying("{}");
    pipeline(&fixture, model.clone()).analyze_emotions(AssessmentRequest::default()).await;
    let prompt = model.last_prompt();
    assert!(prompt.contains("- **Symptom Duration**: Unknown"));
    assert!(prompt.contains("- **Clinical Notes**: \n"));
}

#[tokio::test]
async fn failed_generation_still_returns_the_full_shape() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, Scripted::failing("quota exceeded"));

    let reply = pipeline.analyze_emotions(AssessmentRequest::default()).await;

    assert!(reply.get_str("error").unwrap().starts_with("Failed to generate analysis: "));
    assert!(reply.get_str("error").unwrap().contains("quota exceeded"));
    assert_eq!(reply.get_str("message"), Some(GENERATION_FAILED_MESSAGE));
    assert_eq!(reply.get_str("condition"), Some(NOT_PROVIDED));
    assert_eq!(reply.get("medication_considerations"), Some(&json!([])));
    assert_eq!(reply.get("patient_information").unwrap()["name"], "Anonymous Patient");
}

#[tokio::test]
async fn unparseable_reply_is_reported_with_raw_text() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, Scripted::replying("I cannot produce JSON today."));

    let reply = pipeline.generate_raw("Summarise the session").await.unwrap();

    assert!(reply.get_str("error").unwrap().starts_with("Failed to parse response as JSON"));
    assert_eq!(reply.get_str("raw_response"), Some("I cannot produce JSON today."));
}

#[tokio::test]
async fn blank_raw_prompt_is_rejected_without_calling_the_model() {
    let fixture = fixture();
    let model = Scripted::replying("{}");
    let pipeline = pipeline(&fixture, model.clone());

    let err = pipeline.generate_raw("   ").await.unwrap_err();
    assert!(matches!(err, ClinicError::Validation(_)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn prescription_carries_condition_and_generation_date() {
    let fixture = fixture();
    let model = Scripted::replying(r#"{"medications": [{"name": "Sertraline"}], "therapy_options": "CBT"}"#);
    let pipeline = pipeline(&fixture, model.clone());

    let request: PrescriptionRequest = serde_json::from_value(json!({
        "patient_name": "Sam",
        "patient_age": "41",
        "patient_gender": "female",
        "mental_assessment": {"condition": "Generalised anxiety disorder", "severity": "Moderate"}
    }))
    .unwrap();
    let reply = pipeline.generate_prescription(request).await;

    assert_eq!(reply.get_str("condition"), Some("Generalised anxiety disorder"));
    assert_eq!(reply.get_str("generation_date"), Some("2025-03-07"));
    assert_eq!(reply.get("patient_information"), Some(&json!({"name": "Sam", "age": "41", "gender": "female"})));
    assert_eq!(reply.get("therapy_options"), Some(&json!(["CBT"])));
    assert!(model.last_prompt().contains("Generalised anxiety disorder"));
}

#[tokio::test]
async fn failed_prescription_is_enveloped() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, Scripted::failing("timeout"));

    let reply = pipeline.generate_prescription(PrescriptionRequest::default()).await;

    assert!(reply.get_str("error").unwrap().starts_with("Failed to generate prescription: "));
    assert_eq!(reply.get_str("message"), Some(GENERATION_FAILED_MESSAGE));
    assert_eq!(reply.get_str("generation_date"), Some("2025-03-07"));
}

#[tokio::test]
async fn chat_uses_recent_history_and_returns_message() {
    let fixture = fixture();
    let model = Scripted::replying(
        r#"{"message": "That sounds exhausting. What has your sleep been like?", "validation_and_empathy": "..."}"#,
    );
    let pipeline = pipeline(&fixture, model.clone());

    let history: Vec<ChatTurn> = (0..12)
        .map(|i| if i % 2 == 0 { ChatTurn::user(format!("turn {i}")) } else { ChatTurn::assistant(format!("turn {i}")) })
        .collect();
    let request = ChatRequest::new("I can't sleep and I'm worried all the time")
        .with_emotion("fear")
        .with_history(history);
    let response = pipeline.chat(request).await.unwrap();

    assert_eq!(response.message, "That sounds exhausting. What has your sleep been like?");
    assert!(response.error.is_none());
    assert!(response.details.is_some());

    let prompt = model.last_prompt();
    assert!(!prompt.contains("turn 1\n"));
    assert!(prompt.contains("user: turn 2\n"));
    assert!(prompt.contains("assistant: turn 11\n"));
    assert!(prompt.contains("Patient: I can't sleep and I'm worried all the time"));
}

#[tokio::test]
async fn chat_failure_apologises() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, Scripted::failing("unavailable"));

    let response = pipeline.chat(ChatRequest::new("hello")).await.unwrap();
    assert_eq!(response.message, APOLOGY);
    assert!(response.error.unwrap().starts_with("Failed to generate response: "));
}

#[tokio::test]
async fn blank_chat_message_is_rejected() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, Scripted::replying("{}"));
    assert!(matches!(pipeline.chat(ChatRequest::new(" ")).await, Err(ClinicError::Validation(_))));
}

#[test]
fn builder_requires_retriever_and_gateway() {
    let err = ClinicalPipeline::builder().gateway(LlmGateway::new(Scripted::replying("{}"))).build();
    assert!(matches!(err, Err(ClinicError::Config(_))));
}

// Video workflow fakes.

struct Frames;

impl VideoDecoder for Frames {
    fn decode(&self, _path: &Path) -> mindscope_affect::Result<DecodedVideo> {
        let frames: Vec<_> = (0..10).map(|_| Ok(RgbImage::new(64, 48))).collect();
        Ok(DecodedVideo { fps: 1.0, frames: Box::new(frames.into_iter()) })
    }
}

struct OneFace;

impl FaceDetector for OneFace {
    fn detect(&self, _frame: &RgbImage) -> mindscope_affect::Result<Vec<FaceBox>> {
        Ok(vec![FaceBox { x: 10, y: 10, width: 30, height: 30, confidence: 0.9 }])
    }
}

struct Sad;

fn sad_logits() -> Vec<f32> {
    let mut logits = vec![0.0; 7];
    logits[Emotion::Sad.index()] = 3.0;
    logits
}

impl FaceEmotionClassifier for Sad {
    fn logits(&self, _face: &RgbImage) -> mindscope_affect::Result<Vec<f32>> {
        Ok(sad_logits())
    }
}

impl VoiceEmotionClassifier for Sad {
    fn logits(&self, _window: &[f32], _sample_rate: u32) -> mindscope_affect::Result<Vec<f32>> {
        Ok(sad_logits())
    }
}

/// Writes ten seconds of tone instead of running ffmpeg.
struct ToneTranscoder;

impl MediaTranscoder for ToneTranscoder {
    fn extract_audio(&self, video: &Path, output_wav: &Path) -> mindscope_affect::Result<()> {
        assert!(video.exists());
        let samples = (0..160_000).map(|i| (i as f32 * 0.01).sin() * 0.3).collect();
        let bytes = Waveform::new(samples, 16_000).to_wav_bytes()?;
        std::fs::write(output_wav, bytes).map_err(|e| mindscope_affect::AffectError::Audio(e.to_string()))
    }
}

struct Transcript(&'static str);

#[async_trait]
impl SpeechToText for Transcript {
    async fn transcribe(&self, _audio: &Waveform) -> TranscriptOutcome {
        TranscriptOutcome::from_text(self.0)
    }
}

fn media() -> MediaPipeline {
    let face = FacialEmotionExtractor::new(
        Arc::new(Frames),
        Arc::new(OneFace),
        Arc::new(Sad),
        FaceExtractorConfig::default(),
    );
    let voice = VoiceEmotionExtractor::new(Arc::new(Sad), VoiceExtractorConfig::default());
    MediaPipeline::new(Arc::new(ToneTranscoder), Arc::new(EmotionAnalyzer::new(face, voice)))
        .with_speech(Arc::new(Transcript("I have been feeling tired all week.")))
}

fn video_pipeline(fixture: &Fixture, model: Arc<Scripted>) -> ClinicalPipeline {
    ClinicalPipeline::builder()
        .retriever(fixture.retriever.clone())
        .gateway(LlmGateway::new(model))
        .media(media())
        .clock(clock())
        .build()
        .unwrap()
}

#[tokio::test]
async fn video_assessment_includes_report_and_transcript() {
    let fixture = fixture();
    let model = Scripted::replying(r#"{"condition": "Depressive symptoms", "severity": "Mild"}"#);
    let pipeline = video_pipeline(&fixture, model.clone());

    let upload = VideoUpload::new("../session one.MP4", vec![0u8; 64]);
    let reply = pipeline.analyze_video(upload, PatientDetails::new("Sam", "41", "female")).await.unwrap();

    assert_eq!(reply.get_str("condition"), Some("Depressive symptoms"));
    assert_eq!(reply.get_str("transcribed_text"), Some("I have been feeling tired all week."));
    let report = reply.get_str("emotion_analysis").unwrap();
    assert!(report.starts_with("Temporal Emotion Trends:"));
    assert_eq!(reply.get("recommendations"), Some(&json!([])));

    let prompt = model.last_prompt();
    assert!(prompt.contains("Temporal Emotion Trends:"));
    assert!(prompt.contains("### Patient Speech Transcript\n\nI have been feeling tired all week."));
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let fixture = fixture();
    let model = Scripted::replying("{}");
    let pipeline = video_pipeline(&fixture, model.clone());

    let err = pipeline.analyze_video(VideoUpload::new("notes.pdf", vec![1]), PatientDetails::default()).await;
    assert!(matches!(err, Err(ClinicError::Validation(_))));
    let err = pipeline.analyze_video(VideoUpload::new("clip.mp4", Vec::new()), PatientDetails::default()).await;
    assert!(matches!(err, Err(ClinicError::Validation(_))));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn video_requires_media_pipeline() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, Scripted::replying("{}"));
    let err = pipeline.analyze_video(VideoUpload::new("clip.mp4", vec![1]), PatientDetails::default()).await;
    assert!(matches!(err, Err(ClinicError::Config(_))));
}
