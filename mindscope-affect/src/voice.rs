//! Vocal emotion extraction over fixed-length audio windows.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::{TARGET_SAMPLE_RATE, Waveform};
use crate::emotion::EmotionVector;
use crate::error::{AffectError, Result};
use crate::extractor::{MissingDetection, Window, classify_windows};

/// Maps one audio window to one logit per [`crate::Emotion`].
pub trait VoiceEmotionClassifier: Send + Sync {
    /// Raw logits in classifier order for `window` sampled at `sample_rate`.
    fn logits(&self, window: &[f32], sample_rate: u32) -> Result<Vec<f32>>;
}

/// Settings for [`VoiceEmotionExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceExtractorConfig {
    /// Window length in seconds.
    pub window_seconds: f64,
    /// Rate the audio is resampled to before windowing.
    pub target_sample_rate: u32,
    /// Policy for the short final window.
    pub on_missing_detection: MissingDetection,
}

impl Default for VoiceExtractorConfig {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            target_sample_rate: TARGET_SAMPLE_RATE,
            on_missing_detection: MissingDetection::ZeroPad,
        }
    }
}

impl VoiceExtractorConfig {
    /// Samples per window at the target rate, at least 1.
    pub fn window_samples(&self) -> usize {
        ((self.window_seconds * f64::from(self.target_sample_rate)) as usize).max(1)
    }
}

/// Splits a waveform into windows and classifies each one.
pub struct VoiceEmotionExtractor {
    classifier: Arc<dyn VoiceEmotionClassifier>,
    config: VoiceExtractorConfig,
}

impl VoiceEmotionExtractor {
    /// Assemble an extractor around `classifier`.
    pub fn new(classifier: Arc<dyn VoiceEmotionClassifier>, config: VoiceExtractorConfig) -> Self {
        Self { classifier, config }
    }

    /// The extractor settings.
    pub fn config(&self) -> &VoiceExtractorConfig {
        &self.config
    }

    /// One emotion vector per window. With the default zero-pad policy that
    /// is `ceil(duration / window_seconds)` vectors.
    ///
    /// # Errors
    ///
    /// - [`AffectError::NoAudio`] for an empty waveform
    /// - [`AffectError::Classifier`] if classification fails
    pub fn extract(&self, audio: &Waveform) -> Result<Vec<EmotionVector>> {
        if audio.is_empty() {
            return Err(AffectError::NoAudio);
        }

        let rate = self.config.target_sample_rate;
        let resampled = audio.resampled(rate);
        let window_len = self.config.window_samples();
        info!(
            source_rate = audio.sample_rate,
            duration = audio.duration_seconds(),
            window_len,
            "extracting voice emotions"
        );

        let windows = resampled.samples.chunks(window_len).map(|chunk| -> Result<Window<Vec<f32>>> {
            Ok(if chunk.len() == window_len {
                Window::Complete(chunk.to_vec())
            } else {
                Window::Incomplete(Some(chunk.to_vec()))
            })
        });

        let (vectors, stats) = classify_windows(
            windows,
            self.config.on_missing_detection,
            |partial| {
                let mut window = partial.unwrap_or_default();
                window.resize(window_len, 0.0);
                window
            },
            |window| EmotionVector::from_logits("voice-emotion", &self.classifier.logits(window, rate)?),
        )?;

        if vectors.is_empty() {
            return Err(AffectError::NoAudio);
        }
        info!(segments = stats.windows, "voice emotion extraction complete");
        Ok(vectors)
    }
}
