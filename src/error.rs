use std::path::PathBuf;

use thiserror::Error;

/// Failures of the selection pipeline.
///
/// `NoReferences`, `EmptyBaseline` and `InvalidPercentile` abort a run. The
/// vector errors only ever disqualify the candidate that produced them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SiftError {
    #[error("no valid reference embeddings found in '{}'", dir.display())]
    NoReferences { dir: PathBuf },

    #[error("could not extract a baseline: none of the {sampled} sampled candidate(s) yielded a score")]
    EmptyBaseline { sampled: usize },

    #[error("cannot normalize a zero-length vector")]
    DegenerateVector,

    #[error("embedding has {actual} dimensions, references have {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("percentile threshold must be within 0..=100, got {0}")]
    InvalidPercentile(f32),
}
