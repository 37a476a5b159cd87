//! Cosine similarity between face embeddings.

use ndarray::Array1;

use crate::error::SiftError;
use crate::references::ReferenceSet;
use crate::Embedding;

/// `embedding` scaled to unit length.
pub fn unit_vector(embedding: &Embedding) -> Result<Array1<f32>, SiftError> {
    let norm = embedding.vector.dot(&embedding.vector).sqrt();
    if !norm.is_finite() || norm <= 0.0 {
        return Err(SiftError::DegenerateVector);
    }
    Ok(&embedding.vector / norm)
}

pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f32, SiftError> {
    if a.len() != b.len() {
        return Err(SiftError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }
    let dot = unit_vector(a)?.dot(&unit_vector(b)?);
    Ok(dot.clamp(-1.0, 1.0))
}

/// Mean cosine similarity of `embedding` against every reference.
pub fn score(embedding: &Embedding, references: &ReferenceSet) -> Result<f32, SiftError> {
    let mut total = 0.0f32;
    for reference in references.iter() {
        total += cosine_similarity(embedding, reference)?;
    }
    Ok((total / references.len() as f32).clamp(-1.0, 1.0))
}
