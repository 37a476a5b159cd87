use std::path::Path;

use log::{debug, info, warn};

use crate::catalog::list_images;
use crate::error::SiftError;
use crate::provider::EmbeddingProvider;
use crate::similarity::unit_vector;
use crate::Embedding;

/// Non-empty set of exemplar embeddings sharing one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet {
    embeddings: Vec<Embedding>,
}

impl ReferenceSet {
    /// `None` when `embeddings` is empty.
    pub fn new(embeddings: Vec<Embedding>) -> Option<Self> {
        if embeddings.is_empty() {
            None
        } else {
            Some(Self { embeddings })
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Embedding> {
        self.embeddings.iter()
    }
}

/// Embed every image in `dir`, keeping the first face found in each.
///
/// Files that fail, show no face, or disagree on dimension with the first
/// reference are skipped with a warning.
pub fn load_references<P: EmbeddingProvider + ?Sized>(
    provider: &mut P,
    dir: &Path,
) -> Result<ReferenceSet, SiftError> {
    let no_references = || SiftError::NoReferences {
        dir: dir.to_path_buf(),
    };

    let files = list_images(dir).map_err(|e| {
        warn!("{:#}", e);
        no_references()
    })?;

    let mut embeddings: Vec<Embedding> = Vec::with_capacity(files.len());
    for path in files {
        let name = path.file_name().unwrap_or_default().to_string_lossy();

        let faces = match provider.represent(&path) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Failed to load reference {}: {:#}", name, e);
                continue;
            }
        };
        let Some(face) = faces.into_iter().next() else {
            warn!("No face found in reference {}", name);
            continue;
        };

        if let Err(e) = unit_vector(&face.embedding) {
            warn!("Skipping reference {}: {}", name, e);
            continue;
        }
        if let Some(first) = embeddings.first() {
            if first.len() != face.embedding.len() {
                warn!(
                    "Skipping reference {}: {}",
                    name,
                    SiftError::DimensionMismatch {
                        expected: first.len(),
                        actual: face.embedding.len(),
                    }
                );
                continue;
            }
        }

        debug!("Loaded reference: {}", name);
        embeddings.push(face.embedding);
    }

    let references = ReferenceSet::new(embeddings).ok_or_else(no_references)?;
    info!(
        "Loaded {} reference embedding(s) from {}",
        references.len(),
        dir.display()
    );
    Ok(references)
}
