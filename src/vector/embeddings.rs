//! Deterministic text embeddings.
//!
//! Hash-based bag-of-words plus character trigrams, so retrieval works
//! offline and gives identical results run to run. Every feature is
//! non-negative, which keeps cosine similarity inside `[0, 1]`.

use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::error::VectorStoreError;

/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = 256;

/// Generator for hashed text embeddings.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEmbedder {
    /// Creates an embedder; dimensions below 4 are raised to 4.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(4),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds `text` into a unit-length vector (all zeros for empty text).
    ///
    /// The first half of the vector holds word frequencies, the second half
    /// character trigram counts.
    pub fn embed(&self, text: &str) -> Array1<f64> {
        let mut embedding = Array1::zeros(self.dimension);
        let lower = text.to_lowercase();

        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return embedding;
        }

        let word_dim = self.dimension / 2;
        for word in &words {
            let pos = hash_to_index(word, word_dim);
            embedding[pos] += 1.0 / words.len() as f64;
        }

        let trigram_dim = self.dimension - word_dim;
        for word in &words {
            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                let pos = word_dim + hash_to_index(&trigram, trigram_dim);
                embedding[pos] += 0.5;
            }
        }

        normalize(&mut embedding);
        embedding
    }
}

/// Hashes a string to an index in `[0, max_index)`.
fn hash_to_index(input: &str, max_index: usize) -> usize {
    if max_index == 0 {
        return 0;
    }
    let hash = Sha256::digest(input.as_bytes());
    let value = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]) as usize;
    value % max_index
}

/// Scales to unit L2 norm; near-zero vectors are left alone.
fn normalize(v: &mut Array1<f64>) {
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 1e-10 {
        v.mapv_inplace(|x| x / norm);
    }
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// # Errors
///
/// `VectorStoreError::DimensionMismatch` if the lengths differ.
pub fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> Result<f64, VectorStoreError> {
    if a.len() != b.len() {
        return Err(VectorStoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a < 1e-10 || norm_b < 1e-10 {
        return Ok(0.0);
    }
    Ok((a.dot(b) / (norm_a * norm_b)).clamp(0.0, 1.0))
}
