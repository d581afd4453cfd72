use crate::error::UpstreamError;
use async_trait::async_trait;

/// Turns image bytes into a textual description.
///
/// `variation` 0 asks for the neutral description used for queries; values
/// from 1 upwards shift the emphasis so that each stored variant of one image
/// is phrased differently.
#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, image: &[u8], variation: u8) -> Result<String, UpstreamError>;
}

/// Turns text into a fixed-length embedding.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}
