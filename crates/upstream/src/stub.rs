use crate::prompt::variation_focus;
use async_trait::async_trait;
use recall_index::{Describer, Embedder, UpstreamError};
use recall_vector_store::normalize;

pub const DEFAULT_STUB_DIMENSION: usize = 384;

/// Offline describer: the text depends only on the image bytes and variation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubDescriber;

impl StubDescriber {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Describer for StubDescriber {
    async fn describe(&self, image: &[u8], variation: u8) -> Result<String, UpstreamError> {
        if image.is_empty() {
            return Err(UpstreamError::InvalidResponse(
                "cannot describe an empty image".to_string(),
            ));
        }
        Ok(stub_description(image, variation))
    }
}

fn stub_description(image: &[u8], variation: u8) -> String {
    format!(
        "stub image {:016x} ({} bytes), {} view",
        fnv1a_64(image),
        image.len(),
        variation_focus(variation)
    )
}

/// Offline embedder producing unit-length pseudo-random vectors seeded by the text.
#[derive(Debug, Clone, Copy)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_STUB_DIMENSION)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        Ok(stub_embed(text, self.dimension))
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let mantissa = ((bits >> 32) as u32) >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
