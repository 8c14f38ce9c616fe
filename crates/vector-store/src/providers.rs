use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use std::path::Path;

/// Turns raw image bytes into an embedding vector.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    async fn embed_image(&self, image_id: &str, bytes: &[u8]) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Turns a query string into an embedding vector in the same space as the images.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_text(&self, query: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Describes an image in natural language. `Ok(None)` means no caption was produced.
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image_id: &str, bytes: &[u8]) -> Result<Option<String>>;
}

/// Offline provider producing deterministic unit vectors from hashed input.
///
/// Images and text land in the same space only when their hashed inputs match, so this is
/// for exercising the pipeline, not for meaningful retrieval.
#[derive(Debug, Clone)]
pub struct StubProvider {
    dimension: usize,
}

impl StubProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "stub provider dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

#[async_trait]
impl ImageEmbedder for StubProvider {
    async fn embed_image(&self, image_id: &str, bytes: &[u8]) -> Result<Vec<f32>> {
        if bytes.is_empty() {
            return Err(VectorStoreError::provider(image_id, "empty image"));
        }
        Ok(stub_embed(bytes, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl TextEmbedder for StubProvider {
    async fn embed_text(&self, query: &str) -> Result<Vec<f32>> {
        Ok(stub_embed(query.trim().as_bytes(), self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl Captioner for StubProvider {
    async fn caption(&self, image_id: &str, _bytes: &[u8]) -> Result<Option<String>> {
        let stem = Path::new(image_id)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.replace(['_', '-'], " "))
            .filter(|s| !s.trim().is_empty());
        Ok(stem)
    }
}

/// Embeds `bytes` the way [`StubProvider`] does. Exposed so callers can build queries
/// that hit a known image exactly.
#[must_use]
pub fn stub_embed(bytes: &[u8], dimension: usize) -> Vec<f32> {
    let mut state = fnv1a_64(bytes) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
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
