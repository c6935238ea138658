//! Content synthesis: one prompt in, one raw completion out.
//! No retries here; the next scheduled run is the retry.

pub mod providers;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use tracing::{info, warn};

use crate::compose::GenerationPrompt;
use crate::config::GenerationConfig;

pub use providers::{AnthropicGenerator, MockGenerator, OpenAiGenerator};

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("missing API key for provider {provider}")]
    MissingApiKey { provider: &'static str },
    #[error("unsupported generation provider: {0}")]
    UnsupportedProvider(String),
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode service response: {0}")]
    Decode(String),
    #[error("service returned an empty completion")]
    EmptyResponse,
}

/// Wire-level request shared by all providers.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt: &'a str,
}

pub type GenerationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, SynthesisError>> + Send + 'a>>;

/// Low-level provider doing the actual remote call.
pub trait TextGenerator: Send + Sync {
    fn complete<'a>(&'a self, req: GenerationRequest<'a>) -> GenerationFuture<'a>;
    /// Provider name for metadata/logs.
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Unparsed completion text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse(String);

impl RawResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fixed per-run generation parameters, echoed into artifact metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub struct ContentSynthesizer {
    generator: DynGenerator,
    params: GenerationParams,
}

impl ContentSynthesizer {
    pub fn new(generator: DynGenerator, params: GenerationParams) -> Self {
        Self { generator, params }
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn provider_name(&self) -> &'static str {
        self.generator.name()
    }

    pub async fn synthesize(&self, prompt: &GenerationPrompt) -> Result<RawResponse, SynthesisError> {
        let req = GenerationRequest {
            model: &self.params.model,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            prompt: prompt.as_str(),
        };
        info!(
            target: "synth",
            provider = self.generator.name(),
            model = %self.params.model,
            prompt_chars = req.prompt.len(),
            "requesting completion"
        );

        let t0 = Instant::now();
        let text = self.generator.complete(req).await?;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("generation_duration_ms").record(ms);

        if text.trim().is_empty() {
            warn!(target: "synth", "empty completion");
            return Err(SynthesisError::EmptyResponse);
        }
        info!(target: "synth", elapsed_ms = ms as u64, chars = text.len(), "completion received");
        Ok(RawResponse(text))
    }
}

/// Build the generator according to config and environment.
///
/// * `AI_TEST_MODE=mock` returns a deterministic mock with a well-formed response.
/// * Otherwise `generation.provider` selects `anthropic` or `openai`.
pub fn build_generator(cfg: &GenerationConfig) -> Result<DynGenerator, SynthesisError> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockGenerator::well_formed()));
    }

    let timeout = Duration::from_secs(cfg.timeout_secs);
    match cfg.provider.to_ascii_lowercase().as_str() {
        "anthropic" | "claude" => Ok(Arc::new(AnthropicGenerator::new(
            cfg.api_key.clone(),
            timeout,
        )?)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(cfg.api_key.clone(), timeout)?)),
        other => Err(SynthesisError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_completion_is_an_error() {
        let synth = ContentSynthesizer::new(
            Arc::new(MockGenerator::fixed("  \n ")),
            GenerationParams {
                model: "m".into(),
                temperature: 1.0,
                max_tokens: 10,
            },
        );
        let prompt = crate::compose::PromptComposer::from_template("hi")
            .unwrap()
            .compose(&[])
            .unwrap();
        assert!(matches!(
            synth.synthesize(&prompt).await,
            Err(SynthesisError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn provider_error_propagates_without_retry() {
        let generator = Arc::new(MockGenerator::failing(503));
        let synth = ContentSynthesizer::new(
            generator.clone(),
            GenerationParams {
                model: "m".into(),
                temperature: 1.0,
                max_tokens: 10,
            },
        );
        let prompt = crate::compose::PromptComposer::from_template("hi")
            .unwrap()
            .compose(&[])
            .unwrap();
        let err = synth.synthesize(&prompt).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Status { status: 503, .. }));
        assert_eq!(generator.calls(), 1);
    }
}
