//! Deterministic hash-based embedder.

use super::Embedder;
use crate::Result;
use sha2::{Digest, Sha256};

/// Deterministic bag-of-features embedder.
///
/// Hashes lowercased word tokens and their bigrams into a fixed-dimension
/// signed feature vector, then L2-normalises. The same text always maps to
/// the same vector, so identical content scores cosine 1.0 and texts with
/// heavy word overlap score high. No model download, no network.
///
/// Used by tests and development setups; production points the vector store
/// at a real embedding endpoint instead.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Default embedding dimensions, matching common sentence-transformer
    /// models.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Creates an embedder with the default dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    /// Creates an embedder with explicit dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn feature_index(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let index = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
            % self.dimensions;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimensions];

        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        for token in &tokens {
            let (index, sign) = self.feature_index(token);
            vector[index] += sign;
        }

        // Bigrams keep word order relevant without dominating single-token
        // overlap
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let (index, sign) = self.feature_index(&bigram);
            vector[index] += sign * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        Ok(vector)
    }
}
