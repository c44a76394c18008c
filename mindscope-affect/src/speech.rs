//! Speech-to-text for the audio track of an uploaded video.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;

/// What a transcription attempt produced.
///
/// The failure states are ordinary values: the assessment prompt carries
/// them as text so the model knows why no transcript is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum TranscriptOutcome {
    /// Recognised speech.
    Transcribed(String),
    /// Audio was present but no speech could be recognised.
    NoSpeech,
    /// The recognition service could not be reached.
    ServiceUnavailable,
    /// No audio track could be extracted from the video.
    ExtractionFailed,
}

impl TranscriptOutcome {
    /// Text placed in the prompt and returned to the caller.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Transcribed(text) => text,
            Self::NoSpeech => "Audio not clear or no speech detected.",
            Self::ServiceUnavailable => "Speech recognition service unavailable.",
            Self::ExtractionFailed => "Audio extraction failed.",
        }
    }

    /// Whether this carries recognised speech.
    pub fn is_transcribed(&self) -> bool {
        matches!(self, Self::Transcribed(_))
    }

    /// Blank transcriptions count as [`TranscriptOutcome::NoSpeech`].
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() { Self::NoSpeech } else { Self::Transcribed(text.trim().to_string()) }
    }
}

impl std::fmt::Display for TranscriptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_text())
    }
}

/// Turns audio into text.
///
/// Implementations never fail: every problem maps onto one of the
/// [`TranscriptOutcome`] states.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe `audio`.
    async fn transcribe(&self, audio: &Waveform) -> TranscriptOutcome;
}

/// A recogniser that is not configured. Always reports the service as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSpeechToText;

#[async_trait]
impl SpeechToText for DisabledSpeechToText {
    async fn transcribe(&self, _audio: &Waveform) -> TranscriptOutcome {
        TranscriptOutcome::ServiceUnavailable
    }
}
