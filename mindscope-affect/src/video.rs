//! Frame decoding through the `ffprobe` and `ffmpeg` binaries.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AffectError, Result};
use crate::face::{DecodedVideo, VideoDecoder};

/// Streams RGB frames out of `ffmpeg -f rawvideo`.
#[derive(Debug, Clone)]
pub struct FfmpegVideoDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegVideoDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    r_frame_rate: String,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    #[serde(default)]
    tags: StreamTags,
}

#[derive(Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Default, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Rotation in degrees from the display matrix, else the legacy `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0)
    }
}

/// Size of the frames ffmpeg emits once it has applied `rotation`.
///
/// Quarter turns swap width and height.
pub fn display_size(width: u32, height: u32, rotation: f64) -> (u32, u32) {
    let quarter_turns = (rotation / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 { (height, width) } else { (width, height) }
}

/// Parse an ffprobe rational such as `"30000/1001"` or `"25"`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    (den != 0.0 && num > 0.0).then(|| num / den)
}

impl FfmpegVideoDecoder {
    /// Use the given executables (or look them up on `PATH` when bare).
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32, f64)> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,r_frame_rate:stream_side_data=rotation:stream_tags=rotate"])
            .args(["-of", "json"])
            .arg(path)
            .output()
            .map_err(|e| AffectError::Decode(format!("failed to run {}: {e}", self.ffprobe.display())))?;
        if !output.status.success() {
            return Err(AffectError::Decode(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe(&output.stdout, path)
    }
}

/// Frame width, height and rate from ffprobe JSON, with rotation applied.
fn parse_probe(json: &[u8], path: &Path) -> Result<(u32, u32, f64)> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| AffectError::Decode(format!("unreadable ffprobe output: {e}")))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| AffectError::Decode(format!("{} has no video stream", path.display())))?;
    let fps = parse_frame_rate(&stream.r_frame_rate).ok_or_else(|| {
        AffectError::Decode(format!("unusable frame rate `{}`", stream.r_frame_rate))
    })?;
    if stream.width == 0 || stream.height == 0 {
        return Err(AffectError::Decode("video stream has zero size".to_string()));
    }
    let (width, height) = display_size(stream.width, stream.height, stream.rotation());
    Ok((width, height, fps))
}

impl VideoDecoder for FfmpegVideoDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedVideo> {
        let (width, height, fps) = self.probe(path)?;
        debug!(path = %path.display(), width, height, fps, "decoding video");

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AffectError::Decode(format!("failed to run {}: {e}", self.ffmpeg.display())))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AffectError::Decode("ffmpeg stdout unavailable".to_string()))?;

        Ok(DecodedVideo {
            fps,
            frames: Box::new(RawFrames { child, stdout, width, height, finished: false }),
        })
    }
}

struct RawFrames {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    finished: bool,
}

impl RawFrames {
    fn finish(&mut self) -> Option<Result<RgbImage>> {
        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(AffectError::Decode(format!("ffmpeg exited with {status}")))),
            Err(e) => Some(Err(AffectError::Decode(e.to_string()))),
        }
    }
}

impl Iterator for RawFrames {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => RgbImage::from_raw(self.width, self.height, buffer).map(Ok),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => self.finish(),
            Err(e) => {
                self.finished = true;
                Some(Err(AffectError::Decode(e.to_string())))
            }
        }
    }
}

impl Drop for RawFrames {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.child.kill() {
                warn!(error = %e, "failed to stop ffmpeg");
            }
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rational_frame_rates() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        assert_eq!(display_size(1920, 1080, 0.0), (1920, 1080));
        assert_eq!(display_size(1920, 1080, -90.0), (1080, 1920));
        assert_eq!(display_size(1920, 1080, 270.0), (1080, 1920));
        assert_eq!(display_size(1920, 1080, 180.0), (1920, 1080));
    }

    #[test]
    fn rotated_phone_clip_reports_upright_frame_size() {
        let json = br#"{"streams": [{"width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]}"#;
        assert_eq!(parse_probe(json, Path::new("clip.mp4")).unwrap(), (1080, 1920, 30.0));

        let legacy = br#"{"streams": [{"width": 640, "height": 480, "r_frame_rate": "25/1",
            "tags": {"rotate": "90"}}]}"#;
        assert_eq!(parse_probe(legacy, Path::new("clip.mp4")).unwrap(), (480, 640, 25.0));

        let plain = br#"{"streams": [{"width": 640, "height": 480, "r_frame_rate": "25/1"}]}"#;
        assert_eq!(parse_probe(plain, Path::new("clip.mp4")).unwrap(), (640, 480, 25.0));
    }

    #[test]
    fn missing_probe_binary_is_a_decode_error() {
        let decoder = FfmpegVideoDecoder::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(matches!(decoder.decode(Path::new("clip.mp4")), Err(AffectError::Decode(_))));
    }
}
