use std::path::Path;

use anyhow::Result;
use log::{debug, warn};

use crate::provider::{EmbeddingProvider, Representation};
use crate::Embedding;

/// What a provider saw in one image.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceDetection {
    Detected(Embedding),
    NotDetected,
    /// More than one face; none is picked.
    Ambiguous(usize),
}

impl FaceDetection {
    pub fn from_representations(mut faces: Vec<Representation>) -> Self {
        match faces.len() {
            0 => FaceDetection::NotDetected,
            1 => match faces.pop() {
                Some(face) => {
                    debug!("single face, detector confidence {:.3}", face.confidence);
                    FaceDetection::Detected(face.embedding)
                }
                None => FaceDetection::NotDetected,
            },
            n => FaceDetection::Ambiguous(n),
        }
    }

    pub fn into_embedding(self) -> Option<Embedding> {
        match self {
            FaceDetection::Detected(embedding) => Some(embedding),
            _ => None,
        }
    }
}

pub fn detect<P: EmbeddingProvider + ?Sized>(provider: &mut P, image: &Path) -> Result<FaceDetection> {
    Ok(FaceDetection::from_representations(provider.represent(image)?))
}

/// Embedding of the single face in `image`, if there is exactly one.
///
/// Provider failures are logged and treated as "no face".
pub fn extract<P: EmbeddingProvider + ?Sized>(provider: &mut P, image: &Path) -> Option<Embedding> {
    match detect(provider, image) {
        Ok(FaceDetection::Ambiguous(n)) => {
            debug!("{}: {} faces detected", image.display(), n);
            None
        }
        Ok(detection) => detection.into_embedding(),
        Err(e) => {
            warn!("Face embedding error in {}: {:#}", image.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::ScriptedProvider;

    #[test]
    fn single_face_is_detected() {
        let mut provider = ScriptedProvider::default().face("one.jpg", vec![1.0, 2.0]);
        let detection = detect(&mut provider, Path::new("/in/one.jpg")).unwrap();
        assert_eq!(
            detection,
            FaceDetection::Detected(Embedding::from(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn several_faces_are_ambiguous() {
        let mut provider =
            ScriptedProvider::default().faces("group.jpg", vec![vec![1.0], vec![2.0], vec![3.0]]);
        let path = Path::new("/in/group.jpg");
        assert_eq!(
            detect(&mut provider, path).unwrap(),
            FaceDetection::Ambiguous(3)
        );
        assert_eq!(extract(&mut provider, path), None);
    }

    #[test]
    fn no_face_is_absent() {
        let mut provider = ScriptedProvider::default();
        let path = Path::new("/in/landscape.png");
        assert_eq!(
            detect(&mut provider, path).unwrap(),
            FaceDetection::NotDetected
        );
        assert_eq!(extract(&mut provider, path), None);
    }

    #[test]
    fn provider_error_is_swallowed() {
        let mut provider = ScriptedProvider::default().broken("corrupt.jpg", "bad huffman table");
        let path = Path::new("/in/corrupt.jpg");
        assert!(detect(&mut provider, path).is_err());
        assert_eq!(extract(&mut provider, path), None);
    }
}
