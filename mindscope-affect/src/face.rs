//! Facial emotion extraction from sampled video frames.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::emotion::EmotionVector;
use crate::error::{AffectError, Result};
use crate::extractor::{MissingDetection, Window, classify_windows};

/// A decoded video: its native frame rate and a lazy frame stream.
pub struct DecodedVideo {
    /// Native frames per second.
    pub fps: f64,
    /// Frames in presentation order. An `Err` aborts extraction.
    pub frames: Box<dyn Iterator<Item = Result<RgbImage>> + Send>,
}

/// Opens a video file for frame-by-frame decoding.
pub trait VideoDecoder: Send + Sync {
    /// Decode the video at `path`.
    fn decode(&self, path: &Path) -> Result<DecodedVideo>;
}

/// An axis-aligned face bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge; may be negative when the detector overshoots.
    pub x: i32,
    /// Top edge; may be negative when the detector overshoots.
    pub y: i32,
    /// Box width.
    pub width: u32,
    /// Box height.
    pub height: u32,
    /// Detector confidence.
    #[serde(default)]
    pub confidence: f32,
}

impl FaceBox {
    /// Box area in pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Crop `frame` to this box, clamped to the frame bounds. `None` when the
    /// clamped box is empty.
    pub fn crop(&self, frame: &RgbImage) -> Option<RgbImage> {
        let x0 = self.x.max(0) as u32;
        let y0 = self.y.max(0) as u32;
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(0, i64::from(frame.width())) as u32;
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(0, i64::from(frame.height())) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(imageops::crop_imm(frame, x0, y0, x1 - x0, y1 - y0).to_image())
    }
}

/// Finds faces in a frame.
pub trait FaceDetector: Send + Sync {
    /// All faces found in `frame`, in any order.
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceBox>>;
}

/// Maps a fixed-size face crop to one logit per [`crate::Emotion`].
pub trait FaceEmotionClassifier: Send + Sync {
    /// Raw logits in classifier order.
    fn logits(&self, face: &RgbImage) -> Result<Vec<f32>>;
}

/// Settings for [`FacialEmotionExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceExtractorConfig {
    /// Frames sampled per second of video.
    pub sample_rate: f64,
    /// Side length of the square classifier input.
    pub input_size: u32,
    /// Policy for sampled frames without a face.
    pub on_missing_detection: MissingDetection,
}

impl Default for FaceExtractorConfig {
    fn default() -> Self {
        Self { sample_rate: 1.0, input_size: 224, on_missing_detection: MissingDetection::Skip }
    }
}

impl FaceExtractorConfig {
    /// Every how many native frames one is sampled: `max(1, floor(fps / sample_rate))`.
    pub fn frame_interval(&self, native_fps: f64) -> usize {
        let interval = native_fps / self.sample_rate;
        if interval.is_finite() && interval >= 1.0 { interval as usize } else { 1 }
    }
}

/// Samples frames, keeps the most prominent face and classifies it.
pub struct FacialEmotionExtractor {
    decoder: Arc<dyn VideoDecoder>,
    detector: Arc<dyn FaceDetector>,
    classifier: Arc<dyn FaceEmotionClassifier>,
    config: FaceExtractorConfig,
}

impl FacialEmotionExtractor {
    /// Assemble an extractor from its collaborators.
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        detector: Arc<dyn FaceDetector>,
        classifier: Arc<dyn FaceEmotionClassifier>,
        config: FaceExtractorConfig,
    ) -> Self {
        Self { decoder, detector, classifier, config }
    }

    /// The extractor settings.
    pub fn config(&self) -> &FaceExtractorConfig {
        &self.config
    }

    /// One emotion vector per sampled frame with a detected face.
    ///
    /// # Errors
    ///
    /// - [`AffectError::Decode`] if the video cannot be decoded
    /// - [`AffectError::NoFacesDetected`] if no sampled frame has a face
    /// - [`AffectError::Classifier`] if detection or classification fails
    pub fn extract(&self, video: &Path) -> Result<Vec<EmotionVector>> {
        let decoded = self.decoder.decode(video)?;
        let interval = self.config.frame_interval(decoded.fps);
        let size = self.config.input_size;
        info!(path = %video.display(), fps = decoded.fps, interval, "extracting facial emotions");

        let mut detections = 0usize;
        let windows = decoded
            .frames
            .enumerate()
            .filter(|(i, _)| i % interval == 0)
            .map(|(_, frame)| -> Result<Window<RgbImage>> {
                let frame = frame?;
                let face = self.most_prominent_face(&frame)?;
                if face.is_some() {
                    detections += 1;
                }
                Ok(match face {
                    Some(crop) => {
                        Window::Complete(imageops::resize(&crop, size, size, FilterType::Triangle))
                    }
                    None => Window::Incomplete(None),
                })
            });

        let (vectors, stats) = classify_windows(
            windows,
            self.config.on_missing_detection,
            |_| RgbImage::new(size, size),
            |face| EmotionVector::from_logits("face-emotion", &self.classifier.logits(face)?),
        )?;

        if detections == 0 {
            return Err(AffectError::NoFacesDetected { frames_sampled: stats.windows });
        }
        info!(frames_sampled = stats.windows, faces = detections, "facial emotion extraction complete");
        Ok(vectors)
    }

    fn most_prominent_face(&self, frame: &RgbImage) -> Result<Option<RgbImage>> {
        let faces = self.detector.detect(frame)?;
        Ok(faces
            .iter()
            .filter_map(|face| face.crop(frame).map(|crop| (face.area(), crop)))
            .reduce(|best, next| if next.0 > best.0 { next } else { best })
            .map(|(_, crop)| crop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_interval_floors_and_clamps() {
        let config = FaceExtractorConfig::default();
        assert_eq!(config.frame_interval(30.0), 30);
        assert_eq!(config.frame_interval(29.97), 29);
        assert_eq!(config.frame_interval(0.5), 1);
        assert_eq!(config.frame_interval(f64::NAN), 1);
        let twice = FaceExtractorConfig { sample_rate: 2.0, ..Default::default() };
        assert_eq!(twice.frame_interval(25.0), 12);
    }

    #[test]
    fn crop_is_clamped_to_frame() {
        let frame = RgbImage::new(100, 80);
        let face = FaceBox { x: -10, y: 70, width: 50, height: 40, confidence: 0.9 };
        let crop = face.crop(&frame).unwrap();
        assert_eq!(crop.dimensions(), (40, 10));
        let outside = FaceBox { x: 200, y: 0, width: 10, height: 10, confidence: 0.9 };
        assert!(outside.crop(&frame).is_none());
    }
}
