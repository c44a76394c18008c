//! Builds the library components from a [`MindscopeConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use mindscope_affect::{
    EmotionAnalyzer, FacialEmotionExtractor, FfmpegTranscoder, FfmpegVideoDecoder, InferenceClient,
    OpenAiTranscriber, VoiceEmotionExtractor,
};
use mindscope_clinic::{ClinicalPipeline, GeminiModel, LlmGateway, MediaPipeline};
use mindscope_rag::{
    CsvCorpus, EmbeddingProvider, HashingEmbedder, IndexHandle, OpenAiCompatibleEmbedder, Retriever,
};
use tracing::info;

use crate::config::{MediaSection, MindscopeConfig, RagSection};

fn embedder(rag: &RagSection) -> Arc<dyn EmbeddingProvider> {
    match &rag.embedding_url {
        Some(url) => {
            let mut embedder = OpenAiCompatibleEmbedder::new(url.as_str())
                .with_api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default());
            if let Some(model) = &rag.embedding_model {
                embedder = embedder.with_model(model.as_str(), rag.embedding_dimensions);
            }
            info!(url = %url, "using remote embeddings");
            Arc::new(embedder)
        }
        None => Arc::new(HashingEmbedder::new(rag.embedding_dimensions)),
    }
}

/// The shared index handle with its on-disk cache.
pub fn index_handle(config: &MindscopeConfig) -> Result<Arc<IndexHandle>> {
    let rag = &config.rag;
    let handle = IndexHandle::builder()
        .source(Arc::new(CsvCorpus::new(&rag.corpus_path)))
        .embedder(embedder(rag))
        .config(rag.settings.clone())
        .cache_path(rag.cache_file())
        .build()
        .context("failed to configure the vector index")?;
    Ok(Arc::new(handle))
}

pub fn gateway(config: &MindscopeConfig) -> Result<LlmGateway> {
    let mut model = GeminiModel::from_env()?.with_model(config.llm.model.as_str());
    if let Some(base_url) = &config.llm.base_url {
        model = model.with_base_url(base_url.as_str());
    }
    Ok(LlmGateway::new(Arc::new(model)).with_config(config.llm.generation.clone()))
}

/// Video analysis components, or `None` when no inference service is configured.
pub fn media(media: &MediaSection) -> Result<Option<MediaPipeline>> {
    let Some(url) = &media.inference_url else {
        return Ok(None);
    };
    let models = Arc::new(InferenceClient::new(url.as_str()).context("failed to create inference client")?);
    let face = FacialEmotionExtractor::new(
        Arc::new(FfmpegVideoDecoder::new(&media.ffmpeg, &media.ffprobe)),
        models.clone(),
        models.clone(),
        media.face.clone(),
    );
    let voice = VoiceEmotionExtractor::new(models, media.voice.clone());
    let analyzer = Arc::new(EmotionAnalyzer::new(face, voice));
    let mut pipeline = MediaPipeline::new(Arc::new(FfmpegTranscoder::new(&media.ffmpeg)), analyzer);

    if let Some(url) = &media.transcription_url {
        let mut transcriber =
            OpenAiTranscriber::new(url.as_str()).with_api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default());
        if let Some(model) = &media.transcription_model {
            transcriber = transcriber.with_model(model.as_str());
        }
        pipeline = pipeline.with_speech(Arc::new(transcriber));
    }
    Ok(Some(pipeline))
}

/// The full pipeline. Video analysis is enabled only when `[media]` names an
/// inference service.
pub async fn pipeline(config: &MindscopeConfig, handle: Arc<IndexHandle>) -> Result<ClinicalPipeline> {
    let mut builder = ClinicalPipeline::builder().retriever(Retriever::new(handle)).gateway(gateway(config)?);
    // The blocking HTTP client must be created off the async runtime.
    let section = config.media.clone();
    let media_pipeline =
        tokio::task::spawn_blocking(move || media(&section)).await.context("media setup panicked")??;
    if let Some(media) = media_pipeline {
        builder = builder.media(media);
    }
    Ok(builder.build()?)
}
