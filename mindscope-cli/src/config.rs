//! `mindscope.toml` loading with `MINDSCOPE_*` environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mindscope_affect::{FaceExtractorConfig, VoiceExtractorConfig};
use mindscope_clinic::GenerationConfig;
use mindscope_rag::RagConfig;
use mindscope_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

/// File read when no `--config` is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "mindscope.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindscopeConfig {
    pub rag: RagSection,
    pub llm: LlmSection,
    pub media: MediaSection,
    pub telemetry: TelemetryConfig,
}

/// `[rag]`: corpus, cache and embedding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSection {
    pub corpus_path: PathBuf,
    pub cache_dir: PathBuf,
    /// OpenAI-compatible embeddings server. Local feature hashing is used when unset.
    pub embedding_url: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: usize,
    #[serde(flatten)]
    pub settings: RagConfig,
}

impl Default for RagSection {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/mental_health_qa.csv"),
            cache_dir: PathBuf::from("cache"),
            embedding_url: None,
            embedding_model: None,
            embedding_dimensions: 384,
            settings: RagConfig::default(),
        }
    }
}

impl RagSection {
    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("vector_index.bin")
    }
}

/// `[llm]`: model selection and sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    #[serde(flatten)]
    pub generation: GenerationConfig,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: mindscope_clinic::gemini::DEFAULT_MODEL.to_string(),
            base_url: None,
            generation: GenerationConfig::default(),
        }
    }
}

/// `[media]`: external tools and model endpoints for video analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSection {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Face detection and emotion classification service.
    pub inference_url: Option<String>,
    /// OpenAI-compatible transcription endpoint. Speech is not transcribed when unset.
    pub transcription_url: Option<String>,
    pub transcription_model: Option<String>,
    pub face: FaceExtractorConfig,
    pub voice: VoiceExtractorConfig,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            inference_url: None,
            transcription_url: None,
            transcription_model: None,
            face: FaceExtractorConfig::default(),
            voice: VoiceExtractorConfig::default(),
        }
    }
}

impl MindscopeConfig {
    /// Parse TOML text without applying overrides.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse configuration")
    }

    /// Load `path`, or [`DEFAULT_CONFIG_FILE`] when present, else defaults;
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::read(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Apply `MINDSCOPE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("MINDSCOPE_CORPUS_PATH") {
            self.rag.corpus_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MINDSCOPE_CACHE_DIR") {
            self.rag.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MINDSCOPE_EMBEDDING_URL") {
            self.rag.embedding_url = Some(v);
        }
        if let Some(v) = lookup("MINDSCOPE_EMBEDDING_MODEL") {
            self.rag.embedding_model = Some(v);
        }
        if let Some(v) = lookup("MINDSCOPE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("MINDSCOPE_LOG_LEVEL") {
            self.telemetry.level = v;
        }
        if let Some(v) = lookup("MINDSCOPE_LOG_FORMAT") {
            self.telemetry.format = v.parse().context("MINDSCOPE_LOG_FORMAT")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.rag.settings.validate().context("invalid [rag] settings")?;
        anyhow::ensure!(self.rag.embedding_dimensions > 0, "[rag] embedding_dimensions must be positive");
        anyhow::ensure!(self.media.face.sample_rate > 0.0, "[media.face] sample_rate must be positive");
        anyhow::ensure!(self.media.voice.window_seconds > 0.0, "[media.voice] window_seconds must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mindscope_telemetry::LogFormat;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = MindscopeConfig::from_toml_str("").unwrap();
        assert_eq!(config, MindscopeConfig::default());
        assert_eq!(config.rag.settings.top_k, 3);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.rag.cache_file(), PathBuf::from("cache/vector_index.bin"));
    }

    #[test]
    fn sections_are_read() {
        let config = MindscopeConfig::from_toml_str(
            r#"
            [rag]
            corpus_path = "corpus/qa.csv"
            top_k = 5
            chunk_size = 800

            [llm]
            model = "gemini-2.5-flash"
            temperature = 0.1

            [media]
            inference_url = "http://localhost:9000"

            [media.face]
            sample_rate = 2.0

            [telemetry]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.rag.corpus_path, PathBuf::from("corpus/qa.csv"));
        assert_eq!(config.rag.settings.top_k, 5);
        assert_eq!(config.rag.settings.chunk_size, 800);
        assert_eq!(config.rag.settings.chunk_overlap, 100);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.generation.temperature, 0.1);
        assert_eq!(config.llm.generation.max_output_tokens, 2048);
        assert_eq!(config.media.inference_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.media.face.sample_rate, 2.0);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        config.validate().unwrap();
    }

    #[test]
    fn example_file_matches_defaults() {
        let config = MindscopeConfig::from_toml_str(include_str!("../../mindscope.example.toml")).unwrap();
        assert_eq!(config, MindscopeConfig::default());
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MINDSCOPE_CORPUS_PATH", "/srv/qa.csv"),
            ("MINDSCOPE_LLM_MODEL", "gemini-2.5-pro"),
            ("MINDSCOPE_LOG_FORMAT", "JSON"),
            ("MINDSCOPE_EMBEDDING_URL", "http://embed:8080"),
        ]);
        let mut config = MindscopeConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.rag.corpus_path, PathBuf::from("/srv/qa.csv"));
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(config.rag.embedding_url.as_deref(), Some("http://embed:8080"));
        assert_eq!(config.telemetry.level, "info");
    }

    #[test]
    fn bad_log_format_is_rejected() {
        let mut config = MindscopeConfig::default();
        assert!(config.apply_overrides(|key| (key == "MINDSCOPE_LOG_FORMAT").then(|| "xml".to_string())).is_err());
    }

    #[test]
    fn inconsistent_chunking_fails_validation() {
        let config = MindscopeConfig::from_toml_str("[rag]\nchunk_size = 50\nchunk_overlap = 50\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[rag]\ntop_k = 7\n").unwrap();
        let config = MindscopeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.rag.settings.top_k, 7);
        assert!(MindscopeConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
