//! Single-attempt model calls that always yield a [`ModelReply`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::model::{GenerationConfig, GenerativeModel};
use crate::reply::ModelReply;

/// Sends prompts to a [`GenerativeModel`] and repairs its output.
///
/// The model is called exactly once per prompt. Transport and parse failures
/// come back as an error reply rather than an `Err`.
#[derive(Clone)]
pub struct LlmGateway {
    model: Arc<dyn GenerativeModel>,
    config: GenerationConfig,
}

impl LlmGateway {
    /// Use `model` with the default JSON generation settings.
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model, config: GenerationConfig::default() }
    }

    /// Override the generation settings.
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// The generation settings.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The underlying model's name.
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Generate and parse a reply for `prompt`.
    pub async fn generate(&self, prompt: &str) -> ModelReply {
        let started = Instant::now();
        info!(
            model = self.model.name(),
            temperature = self.config.temperature,
            "generating response"
        );

        let raw = match self.model.generate(prompt, &self.config).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "generation failed");
                return ModelReply::error(e.to_string());
            }
        };

        let reply = ModelReply::parse(&raw);
        match reply.error_message() {
            Some(message) => error!(error = message, "model reply could not be repaired"),
            None => info!(elapsed_ms = started.elapsed().as_millis() as u64, "generated response"),
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::{ClinicError, Result};

    struct Scripted {
        reply: std::result::Result<String, String>,
        calls: Mutex<Vec<GenerationConfig>>,
    }

    #[async_trait]
    impl GenerativeModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str, config: &GenerationConfig) -> Result<String> {
            self.calls.lock().unwrap().push(config.clone());
            self.reply
                .clone()
                .map_err(|message| ClinicError::Model { model: "scripted".into(), message })
        }
    }

    fn gateway(reply: std::result::Result<&str, &str>) -> (LlmGateway, Arc<Scripted>) {
        let model = Arc::new(Scripted {
            reply: reply.map(str::to_string).map_err(str::to_string),
            calls: Mutex::new(Vec::new()),
        });
        (LlmGateway::new(model.clone()), model)
    }

    #[tokio::test]
    async fn repairs_fenced_json() {
        let (gateway, model) = gateway(Ok("```json\n{\"message\":\"hi\"}\n```"));
        assert_eq!(gateway.generate("p").await.into_value(), json!({"message": "hi"}));
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].json_mode);
    }

    #[tokio::test]
    async fn unwraps_list_replies() {
        let (gateway, _) = gateway(Ok("[{\"message\":\"hi\"}]"));
        assert_eq!(gateway.generate("p").await.get_str("message"), Some("hi"));
    }

    #[tokio::test]
    async fn model_failure_is_an_error_reply_without_retry() {
        let (gateway, model) = gateway(Err("quota exceeded"));
        let reply = gateway.generate("p").await;
        assert_eq!(reply.error_message(), Some("Model error (scripted): quota exceeded"));
        assert_eq!(model.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn garbage_is_an_error_reply() {
        let (gateway, _) = gateway(Ok("<html>502</html>"));
        assert!(gateway.generate("p").await.is_error());
    }
}
