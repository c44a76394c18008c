//! End-to-end emotion analysis of one recording.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::Waveform;
use crate::error::Result;
use crate::face::FacialEmotionExtractor;
use crate::fusion::{FusionConfig, FusionReport, fuse};
use crate::mapper::{MentalHealthProfile, map};
use crate::report::render;
use crate::voice::VoiceEmotionExtractor;

/// Everything derived from a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    /// Fused segments, trends and changes.
    pub fusion: FusionReport,
    /// Average scores and insights.
    pub profile: MentalHealthProfile,
    /// The rendered plain-text report.
    pub report: String,
}

/// Runs both extractors, fuses their output and renders the report.
pub struct EmotionAnalyzer {
    face: FacialEmotionExtractor,
    voice: VoiceEmotionExtractor,
    fusion: FusionConfig,
}

impl EmotionAnalyzer {
    /// Combine the two extractors. The fusion frame rate follows the facial
    /// sampling rate and the segment length follows the voice window.
    pub fn new(face: FacialEmotionExtractor, voice: VoiceEmotionExtractor) -> Self {
        let fusion = FusionConfig {
            segment_seconds: voice.config().window_seconds,
            frame_rate: face.config().sample_rate,
            ..FusionConfig::default()
        };
        Self { face, voice, fusion }
    }

    /// Override the fusion settings.
    pub fn with_fusion_config(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }

    /// The fusion settings in use.
    pub fn fusion_config(&self) -> &FusionConfig {
        &self.fusion
    }

    /// Analyse `video` with its already extracted `audio` track.
    ///
    /// Blocking; call from a blocking thread.
    pub fn analyze(&self, video: &Path, audio: &Waveform) -> Result<EmotionAnalysis> {
        let face = self.face.extract(video)?;
        let voice = self.voice.extract(audio)?;
        let fusion = fuse(&face, &voice, &self.fusion, Some(audio.duration_seconds()))?;
        let profile = map(&fusion.segments);
        let report = render(&fusion, &profile);
        info!(
            segments = fusion.segments.len(),
            insights = profile.insights.len(),
            "emotion analysis complete"
        );
        Ok(EmotionAnalysis { fusion, profile, report })
    }
}
