//! Temporal fusion of facial and vocal emotion sequences.
//!
//! Facial vectors arrive at `frame_rate` per second, vocal vectors at one
//! per `segment_seconds`. Each vocal segment is paired with the mean of the
//! facial vectors covering the same span and the two channels are averaged
//! with equal weight.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::emotion::{Emotion, EmotionVector};
use crate::error::FusionError;

/// Settings for [`fuse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Length of one fused segment in seconds.
    pub segment_seconds: f64,
    /// Facial vectors per second of video.
    pub frame_rate: f64,
    /// Standard deviation, in percentage points, above which a channel is
    /// flagged as highly variable.
    pub variability_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { segment_seconds: 2.0, frame_rate: 1.0, variability_threshold: 15.0 }
    }
}

impl FusionConfig {
    /// Facial vectors per segment, `floor(frame_rate * segment_seconds)`, at least 1.
    pub fn frames_per_segment(&self) -> usize {
        let frames = self.frame_rate * self.segment_seconds;
        if frames.is_finite() && frames >= 1.0 { frames as usize } else { 1 }
    }
}

/// One time span with its combined emotion distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSegment {
    /// Segment start in seconds.
    pub time_start: f64,
    /// Segment end in seconds.
    pub time_end: f64,
    /// `(face_avg + voice) / 2`.
    pub emotion_vector: EmotionVector,
    /// `argmax(emotion_vector)`, first label on ties.
    pub dominant_label: Emotion,
    /// `max(emotion_vector)`.
    pub dominant_probability: f32,
}

impl FusedSegment {
    /// `"[0.0s - 2.0s]: Sad (71.3%)"`.
    pub fn trend(&self) -> String {
        format!(
            "[{:.1}s - {:.1}s]: {} ({:.1}%)",
            self.time_start,
            self.time_end,
            self.dominant_label.label(),
            self.dominant_probability * 100.0
        )
    }
}

/// Fused segments plus the narrative derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionReport {
    /// One entry per fused segment, in time order.
    pub segments: Vec<FusedSegment>,
    /// One trend line per segment.
    pub trends: Vec<String>,
    /// Dominant-label transitions between consecutive segments.
    pub changes: Vec<String>,
    /// High-variability flags for the sad and happy channels.
    pub variability_flags: Vec<String>,
}

impl FusionReport {
    /// Transitions followed by variability flags.
    pub fn notable_changes(&self) -> impl Iterator<Item = &String> {
        self.changes.iter().chain(&self.variability_flags)
    }
}

/// Align and combine facial and vocal emotion sequences.
///
/// Segment `i` runs over `0..min(voice.len(), face.len() / fps_seg + 1)`.
/// When segment `i` has no facial vectors of its own, the last facial vector
/// stands in. `media_duration`, when known, clamps the end of the final
/// segment.
///
/// # Errors
///
/// [`FusionError::NoFacialSignal`] or [`FusionError::NoVocalSignal`] when
/// the corresponding input is empty.
pub fn fuse(
    face: &[EmotionVector],
    voice: &[EmotionVector],
    config: &FusionConfig,
    media_duration: Option<f64>,
) -> Result<FusionReport, FusionError> {
    let Some(last_face) = face.last() else {
        return Err(FusionError::NoFacialSignal);
    };
    if voice.is_empty() {
        return Err(FusionError::NoVocalSignal);
    }

    let per_segment = config.frames_per_segment();
    let count = voice.len().min(face.len() / per_segment + 1);
    debug!(faces = face.len(), voices = voice.len(), per_segment, count, "fusing emotion channels");

    let segments: Vec<FusedSegment> = voice
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, voice_vector)| {
            let start = (i * per_segment).min(face.len());
            let end = ((i + 1) * per_segment).min(face.len());
            let face_avg = EmotionVector::mean(&face[start..end]).unwrap_or(*last_face);
            let combined = face_avg.midpoint(voice_vector);
            let (dominant_label, dominant_probability) = combined.dominant();

            let time_start = i as f64 * config.segment_seconds;
            let mut time_end = (i + 1) as f64 * config.segment_seconds;
            if let Some(duration) = media_duration.filter(|d| d.is_finite()) {
                time_end = time_end.min(duration).max(time_start);
            }

            FusedSegment { time_start, time_end, emotion_vector: combined, dominant_label, dominant_probability }
        })
        .collect();

    let trends = segments.iter().map(FusedSegment::trend).collect();

    let changes = segments
        .windows(2)
        .filter(|pair| pair[0].dominant_label != pair[1].dominant_label)
        .map(|pair| {
            format!(
                "Emotion shift from {} to {} at {:.1}s",
                pair[0].dominant_label.label(),
                pair[1].dominant_label.label(),
                pair[1].time_start
            )
        })
        .collect();

    let mut variability_flags = Vec::new();
    for (emotion, noun) in [(Emotion::Sad, "sadness"), (Emotion::Happy, "happiness")] {
        let spread = channel_std(&segments, emotion) * 100.0;
        if spread > config.variability_threshold {
            variability_flags.push(format!("High variability in {noun} ({spread:.1}%)"));
        }
    }

    Ok(FusionReport { segments, trends, changes, variability_flags })
}

/// Population standard deviation of one channel across segments.
fn channel_std(segments: &[FusedSegment], emotion: Emotion) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }
    let n = segments.len() as f64;
    let values: Vec<f64> = segments.iter().map(|s| f64::from(s.emotion_vector.get(emotion))).collect();
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
