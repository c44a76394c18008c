//! Error types for the `mindscope-affect` crate.

use thiserror::Error;

/// Errors raised while extracting emotions from media.
#[derive(Debug, Error)]
pub enum AffectError {
    /// The video could not be opened or a frame could not be decoded.
    #[error("Video decode error: {0}")]
    Decode(String),

    /// No face was detected in any sampled frame.
    #[error("No faces detected in {frames_sampled} sampled frames")]
    NoFacesDetected {
        /// How many frames were inspected.
        frames_sampled: usize,
    },

    /// The audio track is empty.
    #[error("No audio extracted")]
    NoAudio,

    /// A detector or classifier failed or returned malformed output.
    #[error("Classifier error ({stage}): {message}")]
    Classifier {
        /// Which model failed (`face-detector`, `face-emotion`, `voice-emotion`).
        stage: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// A WAV file could not be read or written.
    #[error("Audio error: {0}")]
    Audio(String),

    /// The external transcoder failed.
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// Face and voice signals could not be fused.
    #[error(transparent)]
    Fusion(#[from] FusionError),
}

/// Reasons the fusion engine refuses its input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FusionError {
    /// The facial channel produced no vectors.
    #[error("No facial emotion signal to fuse")]
    NoFacialSignal,

    /// The vocal channel produced no vectors.
    #[error("No vocal emotion signal to fuse")]
    NoVocalSignal,
}

impl From<hound::Error> for AffectError {
    fn from(e: hound::Error) -> Self {
        Self::Audio(e.to_string())
    }
}

/// A convenience result type for extraction operations.
pub type Result<T> = std::result::Result<T, AffectError>;
