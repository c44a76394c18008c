//! Separating the audio track from uploaded video.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error};

use crate::error::{AffectError, Result};

/// Writes the audio track of a video as 16 kHz mono PCM WAV.
pub trait MediaTranscoder: Send + Sync {
    /// Extract the audio of `video` into `output_wav`.
    fn extract_audio(&self, video: &Path, output_wav: &Path) -> Result<()>;
}

/// Runs the `ffmpeg` binary.
///
/// Equivalent to `ffmpeg -y -i <video> -vn -acodec pcm_s16le -ar 16000 -ac 1 <wav>`.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    /// Use the ffmpeg executable at `binary` (or on `PATH` when bare).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// The argument list passed to ffmpeg.
    pub fn arguments(video: &Path, output_wav: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec!["-y".into(), "-i".into(), video.into()];
        args.extend(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"].map(std::ffi::OsString::from));
        args.push(output_wav.into());
        args
    }
}

impl MediaTranscoder for FfmpegTranscoder {
    fn extract_audio(&self, video: &Path, output_wav: &Path) -> Result<()> {
        debug!(binary = %self.binary.display(), video = %video.display(), "extracting audio track");
        let output = Command::new(&self.binary)
            .args(Self::arguments(video, output_wav))
            .output()
            .map_err(|e| {
                AffectError::Transcode(format!(
                    "failed to run {} (is it installed?): {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(5)..].join("\n");
            error!(status = ?output.status.code(), "ffmpeg audio extraction failed");
            return Err(AffectError::Transcode(format!(
                "ffmpeg exited with code {}: {tail}",
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_request_sixteen_kilohertz_mono_pcm() {
        let args = FfmpegTranscoder::arguments(Path::new("in.mp4"), Path::new("out.wav"));
        let rendered: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            rendered,
            ["-y", "-i", "in.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "out.wav"]
        );
    }

    #[test]
    fn missing_binary_is_a_transcode_error() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/ffmpeg-binary");
        let err = transcoder.extract_audio(Path::new("in.mp4"), Path::new("out.wav")).unwrap_err();
        assert!(matches!(err, AffectError::Transcode(_)));
    }
}
