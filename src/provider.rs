use std::path::Path;

use anyhow::Result;

use crate::{Embedding, Pipeline};

/// One face reported by an [`EmbeddingProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    pub embedding: Embedding,
    pub confidence: f32,
}

/// Source of face embeddings for an image on disk.
///
/// Detection is relaxed: an image without a face yields an empty list rather
/// than an error. Errors are reserved for images that cannot be processed at
/// all (unreadable, undecodable, model failure).
pub trait EmbeddingProvider {
    fn represent(&mut self, image: &Path) -> Result<Vec<Representation>>;
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for &mut P {
    fn represent(&mut self, image: &Path) -> Result<Vec<Representation>> {
        (**self).represent(image)
    }
}

impl EmbeddingProvider for Pipeline {
    fn represent(&mut self, image: &Path) -> Result<Vec<Representation>> {
        Ok(self
            .represent_path(image)?
            .into_iter()
            .map(|face| Representation {
                confidence: face.detection.score,
                embedding: face.embedding,
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Provider answering from a table keyed by file name.
    #[derive(Default)]
    pub struct ScriptedProvider {
        faces: HashMap<String, Vec<Vec<f32>>>,
        broken: HashMap<String, String>,
        pub calls: Vec<String>,
    }

    impl ScriptedProvider {
        pub fn face(mut self, name: &str, vector: Vec<f32>) -> Self {
            self.faces.insert(name.to_string(), vec![vector]);
            self
        }

        pub fn faces(mut self, name: &str, vectors: Vec<Vec<f32>>) -> Self {
            self.faces.insert(name.to_string(), vectors);
            self
        }

        pub fn broken(mut self, name: &str, reason: &str) -> Self {
            self.broken.insert(name.to_string(), reason.to_string());
            self
        }
    }

    impl EmbeddingProvider for ScriptedProvider {
        fn represent(&mut self, image: &Path) -> Result<Vec<Representation>> {
            let name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.calls.push(name.clone());

            if let Some(reason) = self.broken.get(&name) {
                anyhow::bail!("{}", reason);
            }
            Ok(self
                .faces
                .get(&name)
                .map(|vectors| {
                    vectors
                        .iter()
                        .map(|v| Representation {
                            embedding: Embedding::from(v.clone()),
                            confidence: 0.9,
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }
}
