//! Describer and embedder backends: OpenAI-compatible HTTP clients and
//! deterministic offline stubs.

mod image;
mod mode;
mod openai;
mod prompt;
mod stub;

use recall_index::{Describer, Embedder, UpstreamError};
use std::sync::Arc;

pub use image::{data_url, ImageFormat};
pub use mode::{UpstreamMode, UPSTREAM_MODE_ENV};
pub use openai::{
    build_http_client, known_embedding_dimension, OpenAiConfig, OpenAiDescriber, OpenAiEmbedder,
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_VISION_MODEL, DESCRIPTION_MAX_TOKENS,
};
pub use prompt::{
    instruction_for, load_system_prompt, variation_focus, ANALYSIS_INSTRUCTION,
    DEFAULT_PROMPT_FILE, DEFAULT_SYSTEM_PROMPT,
};
pub use stub::{StubDescriber, StubEmbedder, DEFAULT_STUB_DIMENSION};

/// The describer/embedder pair an index manager is opened with.
#[derive(Clone)]
pub struct Backends {
    pub describer: Arc<dyn Describer>,
    pub embedder: Arc<dyn Embedder>,
}

impl Backends {
    /// Builds backends for `mode`. `embedding_dimension` sizes the stub
    /// embedder or overrides the OpenAI model's known width.
    pub fn build(
        mode: UpstreamMode,
        embedding_dimension: Option<usize>,
    ) -> Result<Self, UpstreamError> {
        match mode {
            UpstreamMode::Stub => {
                let dimension = embedding_dimension.unwrap_or(DEFAULT_STUB_DIMENSION);
                log::info!("Using stub upstream (dimension {dimension})");
                Ok(Self {
                    describer: Arc::new(StubDescriber::new()),
                    embedder: Arc::new(StubEmbedder::new(dimension)),
                })
            }
            UpstreamMode::OpenAi => {
                let mut config = OpenAiConfig::from_env()?;
                if embedding_dimension.is_some() {
                    config.embedding_dimension = embedding_dimension;
                }
                Self::openai(&config)
            }
        }
    }

    /// Embedding width `build` would report, without credentials or a client.
    /// `None` when the OpenAI model's width is unknown and not overridden.
    #[must_use]
    pub fn dimension_hint(
        mode: UpstreamMode,
        embedding_dimension: Option<usize>,
    ) -> Option<usize> {
        match mode {
            UpstreamMode::Stub => embedding_dimension.or(Some(DEFAULT_STUB_DIMENSION)),
            UpstreamMode::OpenAi => embedding_dimension
                .or_else(|| known_embedding_dimension(&openai::configured_embedding_model())),
        }
    }

    pub fn openai(config: &OpenAiConfig) -> Result<Self, UpstreamError> {
        let client = build_http_client()?;
        let embedder = OpenAiEmbedder::new(client.clone(), config)?;
        log::info!(
            "Using OpenAI upstream at {} (vision {}, embeddings {} dim {})",
            config.base_url,
            config.vision_model,
            config.embedding_model,
            embedder.dimension()
        );
        Ok(Self {
            describer: Arc::new(OpenAiDescriber::new(client, config)),
            embedder: Arc::new(embedder),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backends_honor_dimension() {
        let backends = Backends::build(UpstreamMode::Stub, Some(8)).unwrap();
        assert_eq!(backends.embedder.dimension(), 8);

        let backends = Backends::build(UpstreamMode::Stub, None).unwrap();
        assert_eq!(backends.embedder.dimension(), DEFAULT_STUB_DIMENSION);
    }

    #[test]
    fn dimension_hint_needs_no_credentials() {
        assert_eq!(
            Backends::dimension_hint(UpstreamMode::Stub, None),
            Some(DEFAULT_STUB_DIMENSION)
        );
        assert_eq!(Backends::dimension_hint(UpstreamMode::Stub, Some(16)), Some(16));
        assert_eq!(Backends::dimension_hint(UpstreamMode::OpenAi, Some(64)), Some(64));
    }

    #[test]
    fn openai_backends_use_model_width() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = OpenAiConfig::new("sk-test");
        config.prompt_file = tmp.path().join("prompt.txt");
        let backends = Backends::openai(&config).unwrap();
        assert_eq!(backends.embedder.dimension(), 1536);
    }
}
