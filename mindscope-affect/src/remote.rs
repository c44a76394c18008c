//! HTTP clients for model servers that host the detectors and classifiers.
//!
//! Only available when the `remote` feature is enabled.
//!
//! The inference server is expected to expose:
//!
//! | Route                   | Body                  | Response                  |
//! |-------------------------|-----------------------|---------------------------|
//! | `POST /face/detect`     | multipart `image` PNG | `{"boxes": [FaceBox]}`    |
//! | `POST /face/emotion`    | multipart `image` PNG | `{"logits": [f32; 7]}`    |
//! | `POST /voice/emotion`   | `audio/wav` bytes     | `{"logits": [f32; 7]}`    |
//!
//! Speech recognition goes to any OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::audio::Waveform;
use crate::error::{AffectError, Result};
use crate::face::{FaceBox, FaceDetector, FaceEmotionClassifier};
use crate::speech::{SpeechToText, TranscriptOutcome};
use crate::voice::VoiceEmotionClassifier;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    boxes: Vec<FaceBox>,
}

#[derive(Deserialize)]
struct LogitsResponse {
    logits: Vec<f32>,
}

/// Blocking client for a face/voice inference server.
///
/// Call it from blocking threads only; the extractors already run there.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl InferenceClient {
    /// Connect to the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AffectError::Classifier { stage: "inference-client", message: e.to_string() })?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    /// The server root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn png_form(stage: &'static str, frame: &RgbImage) -> Result<Form> {
        let mut bytes = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| AffectError::Classifier { stage, message: format!("failed to encode frame: {e}") })?;
        let part = Part::bytes(bytes)
            .file_name("frame.png")
            .mime_str("image/png")
            .map_err(|e| AffectError::Classifier { stage, message: e.to_string() })?;
        Ok(Form::new().part("image", part))
    }

    fn post<T: for<'de> Deserialize<'de>>(
        &self,
        stage: &'static str,
        route: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T> {
        debug!(stage, route, "calling inference server");
        let response = request.send().map_err(|e| {
            error!(error = %e, stage, "inference request failed");
            AffectError::Classifier { stage, message: format!("request failed: {e}") }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            error!(%status, stage, "inference server error");
            return Err(AffectError::Classifier { stage, message: format!("server returned {status}: {body}") });
        }
        response
            .json()
            .map_err(|e| AffectError::Classifier { stage, message: format!("malformed response: {e}") })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }
}

impl FaceDetector for InferenceClient {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceBox>> {
        const STAGE: &str = "face-detector";
        let form = Self::png_form(STAGE, frame)?;
        let request = self.client.post(self.url("/face/detect")).multipart(form);
        let parsed: DetectResponse = self.post(STAGE, "/face/detect", request)?;
        Ok(parsed.boxes)
    }
}

impl FaceEmotionClassifier for InferenceClient {
    fn logits(&self, face: &RgbImage) -> Result<Vec<f32>> {
        const STAGE: &str = "face-emotion";
        let form = Self::png_form(STAGE, face)?;
        let request = self.client.post(self.url("/face/emotion")).multipart(form);
        let parsed: LogitsResponse = self.post(STAGE, "/face/emotion", request)?;
        Ok(parsed.logits)
    }
}

impl VoiceEmotionClassifier for InferenceClient {
    fn logits(&self, window: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        const STAGE: &str = "voice-emotion";
        let wav = Waveform::new(window.to_vec(), sample_rate).to_wav_bytes()?;
        let request = self
            .client
            .post(self.url("/voice/emotion"))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav);
        let parsed: LogitsResponse = self.post(STAGE, "/voice/emotion", request)?;
        Ok(parsed.logits)
    }
}

/// Default transcription model name.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// [`SpeechToText`] against an OpenAI-compatible transcription endpoint.
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTranscriber {
    /// Transcribe through `{base_url}/v1/audio/transcriptions`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }

    /// Send `Authorization: Bearer <key>`; ignored when empty.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Use a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SpeechToText for OpenAiTranscriber {
    async fn transcribe(&self, audio: &Waveform) -> TranscriptOutcome {
        if audio.is_empty() {
            return TranscriptOutcome::NoSpeech;
        }
        let wav = match audio.to_wav_bytes() {
            Ok(wav) => wav,
            Err(e) => {
                warn!(error = %e, "could not encode audio for transcription");
                return TranscriptOutcome::ExtractionFailed;
            }
        };
        let file = match reqwest::multipart::Part::bytes(wav).file_name("audio.wav").mime_str("audio/wav") {
            Ok(part) => part,
            Err(e) => {
                error!(error = %e, "invalid transcription upload");
                return TranscriptOutcome::ServiceUnavailable;
            }
        };
        let form = reqwest::multipart::Form::new().text("model", self.model.clone()).part("file", file);

        let mut request =
            self.client.post(format!("{}/v1/audio/transcriptions", self.base_url)).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "could not reach speech recognition service");
                return TranscriptOutcome::ServiceUnavailable;
            }
        };
        let status = response.status();
        if status.is_client_error() && status != reqwest::StatusCode::UNAUTHORIZED {
            warn!(%status, "speech recognition rejected the audio");
            return TranscriptOutcome::NoSpeech;
        }
        if !status.is_success() {
            error!(%status, "speech recognition service error");
            return TranscriptOutcome::ServiceUnavailable;
        }

        match response.json::<TranscriptionResponse>().await {
            Ok(parsed) => {
                let outcome = TranscriptOutcome::from_text(parsed.text);
                debug!(transcribed = outcome.is_transcribed(), "transcription complete");
                outcome
            }
            Err(e) => {
                error!(error = %e, "malformed transcription response");
                TranscriptOutcome::ServiceUnavailable
            }
        }
    }
}
