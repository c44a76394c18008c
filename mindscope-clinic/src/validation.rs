//! Input checks shared by the workflows.

use crate::error::{ClinicError, Result};

/// Upload extensions accepted for video analysis.
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// `value` trimmed, or a validation error naming `field` when it is blank.
pub fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClinicError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// The lower-cased extension of an uploaded video file name.
pub fn video_extension(filename: &str) -> Result<String> {
    if filename.trim().is_empty() {
        return Err(ClinicError::validation("No video file selected"));
    }
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            ClinicError::validation(format!(
                "Unsupported video type for '{filename}'; expected one of: {}",
                VIDEO_EXTENSIONS.join(", ")
            ))
        })?;
    Ok(extension)
}

/// A file name safe to create inside a private directory.
///
/// Path separators and anything outside `[A-Za-z0-9._-]` are dropped,
/// whitespace becomes `_` and leading dots are removed.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']);
    if cleaned.is_empty() { "upload".to_string() } else { cleaned.to_string() }
}
