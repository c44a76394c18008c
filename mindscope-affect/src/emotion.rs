//! The fixed emotion vocabulary and probability vectors over it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AffectError, Result};

/// Number of labels in the vocabulary.
pub const EMOTION_COUNT: usize = 7;

/// An emotion label. Declaration order is the classifier output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    /// All labels in classifier order.
    pub const ALL: [Emotion; EMOTION_COUNT] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    /// Position in the classifier output.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase name, e.g. `"sad"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }

    /// Capitalised name for reports, e.g. `"Sad"`.
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Neutral => "Neutral",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == lowered)
            .ok_or_else(|| format!("unknown emotion `{s}`"))
    }
}

/// A probability distribution (or an average of several) over [`Emotion`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionVector([f32; EMOTION_COUNT]);

impl EmotionVector {
    /// The all-zero vector.
    pub const ZERO: EmotionVector = EmotionVector([0.0; EMOTION_COUNT]);

    /// Wrap raw probabilities given in classifier order.
    pub fn new(values: [f32; EMOTION_COUNT]) -> Self {
        Self(values)
    }

    /// Softmax over classifier logits.
    ///
    /// # Errors
    ///
    /// Returns [`AffectError::Classifier`] if `logits` does not have exactly
    /// [`EMOTION_COUNT`] finite entries.
    pub fn from_logits(stage: &'static str, logits: &[f32]) -> Result<Self> {
        if logits.len() != EMOTION_COUNT || logits.iter().any(|l| !l.is_finite()) {
            return Err(AffectError::Classifier {
                stage,
                message: format!("expected {EMOTION_COUNT} finite logits, got {logits:?}"),
            });
        }
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut values = [0.0f32; EMOTION_COUNT];
        for (v, l) in values.iter_mut().zip(logits) {
            *v = (l - max).exp();
        }
        let sum: f32 = values.iter().sum();
        values.iter_mut().for_each(|v| *v /= sum);
        Ok(Self(values))
    }

    /// Probability of one label.
    pub fn get(&self, emotion: Emotion) -> f32 {
        self.0[emotion.index()]
    }

    /// Raw values in classifier order.
    pub fn as_array(&self) -> &[f32; EMOTION_COUNT] {
        &self.0
    }

    /// `(label, value)` pairs in classifier order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// The highest-scoring label and its value. The first label wins ties.
    pub fn dominant(&self) -> (Emotion, f32) {
        let mut best = (Emotion::ALL[0], self.0[0]);
        for (emotion, value) in self.iter().skip(1) {
            if value > best.1 {
                best = (emotion, value);
            }
        }
        best
    }

    /// Element-wise mean of `vectors`, or `None` for an empty slice.
    pub fn mean(vectors: &[EmotionVector]) -> Option<Self> {
        if vectors.is_empty() {
            return None;
        }
        let mut sum = [0.0f32; EMOTION_COUNT];
        for vector in vectors {
            for (s, v) in sum.iter_mut().zip(vector.0) {
                *s += v;
            }
        }
        let n = vectors.len() as f32;
        sum.iter_mut().for_each(|s| *s /= n);
        Some(Self(sum))
    }

    /// Element-wise `(self + other) / 2`.
    pub fn midpoint(&self, other: &EmotionVector) -> Self {
        let mut out = [0.0f32; EMOTION_COUNT];
        for ((o, a), b) in out.iter_mut().zip(self.0).zip(other.0) {
            *o = (a + b) / 2.0;
        }
        Self(out)
    }
}
