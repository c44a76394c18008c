//! The windowed classification loop shared by the facial and vocal extractors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::emotion::EmotionVector;
use crate::error::Result;

/// What to do with a window that lacks complete input.
///
/// A facial window is incomplete when no face was detected in the sampled
/// frame. A vocal window is incomplete when it is the short tail of the
/// waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDetection {
    /// Drop the window; the output gets shorter.
    Skip,
    /// Zero-fill the window and classify it anyway.
    ZeroPad,
}

/// One unit of input for a classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Window<T> {
    /// Input that fills the whole window.
    Complete(T),
    /// Partial input, or `None` when nothing was detected.
    Incomplete(Option<T>),
}

/// Counters describing one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Windows seen.
    pub windows: usize,
    /// Windows that were complete.
    pub complete: usize,
    /// Incomplete windows that were padded and classified.
    pub padded: usize,
    /// Incomplete windows that were dropped.
    pub skipped: usize,
}

/// Classify every window, applying `policy` to incomplete ones.
///
/// `pad` turns partial (or absent) input into a full window and is only
/// called under [`MissingDetection::ZeroPad`]. The first error from the
/// window source or the classifier aborts the run.
pub fn classify_windows<T, I, P, C>(
    windows: I,
    policy: MissingDetection,
    mut pad: P,
    mut classify: C,
) -> Result<(Vec<EmotionVector>, WindowStats)>
where
    I: IntoIterator<Item = Result<Window<T>>>,
    P: FnMut(Option<T>) -> T,
    C: FnMut(&T) -> Result<EmotionVector>,
{
    let mut vectors = Vec::new();
    let mut stats = WindowStats::default();

    for window in windows {
        stats.windows += 1;
        let input = match (window?, policy) {
            (Window::Complete(input), _) => {
                stats.complete += 1;
                input
            }
            (Window::Incomplete(partial), MissingDetection::ZeroPad) => {
                stats.padded += 1;
                pad(partial)
            }
            (Window::Incomplete(_), MissingDetection::Skip) => {
                stats.skipped += 1;
                continue;
            }
        };
        vectors.push(classify(&input)?);
    }

    debug!(
        windows = stats.windows,
        complete = stats.complete,
        padded = stats.padded,
        skipped = stats.skipped,
        "classified windows"
    );
    Ok((vectors, stats))
}
