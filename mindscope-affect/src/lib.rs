//! # mindscope-affect
//!
//! Multimodal emotion analysis for recorded patient sessions.
//!
//! ## Overview
//!
//! - [`FacialEmotionExtractor`] samples video frames, crops the most
//!   prominent face and classifies it
//! - [`VoiceEmotionExtractor`] classifies fixed-length audio windows
//! - [`fuse`] aligns both channels into timed segments with trends,
//!   transitions and variability flags
//! - [`map`] turns average scores into mental-health insights
//! - [`render`] produces the plain-text report
//! - [`EmotionAnalyzer`] runs the whole chain for one recording
//!
//! Detectors, classifiers, decoders and the transcoder are traits so model
//! runtimes can be swapped without touching the pipeline. With the `remote`
//! feature, [`remote::InferenceClient`] implements the model traits over
//! HTTP.

pub mod analysis;
pub mod audio;
pub mod emotion;
pub mod error;
pub mod extractor;
pub mod face;
pub mod fusion;
pub mod mapper;
pub mod report;
pub mod speech;
pub mod transcoder;
pub mod video;
pub mod voice;

#[cfg(feature = "remote")]
pub mod remote;

pub use analysis::{EmotionAnalysis, EmotionAnalyzer};
pub use audio::{TARGET_SAMPLE_RATE, Waveform, decode_wav_bytes, load_wav, resample_linear};
pub use emotion::{EMOTION_COUNT, Emotion, EmotionVector};
pub use error::{AffectError, FusionError, Result};
pub use extractor::{MissingDetection, Window, WindowStats, classify_windows};
pub use face::{
    DecodedVideo, FaceBox, FaceDetector, FaceEmotionClassifier, FaceExtractorConfig,
    FacialEmotionExtractor, VideoDecoder,
};
pub use fusion::{FusedSegment, FusionConfig, FusionReport, fuse};
pub use mapper::{MentalHealthProfile, NO_INDICATORS, insights_for, map};
pub use report::{DISCLAIMER, render};
pub use speech::{DisabledSpeechToText, SpeechToText, TranscriptOutcome};
pub use transcoder::{FfmpegTranscoder, MediaTranscoder};
pub use video::FfmpegVideoDecoder;
pub use voice::{VoiceEmotionClassifier, VoiceEmotionExtractor, VoiceExtractorConfig};

#[cfg(feature = "remote")]
pub use remote::{InferenceClient, OpenAiTranscriber};
