use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;

use crate::face::{self, Detection, Embedding};
use crate::model::{self, ModelPaths};

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.3;

/// One detected face together with its embedding.
#[derive(Debug, Clone)]
pub struct FaceRepresentation {
    pub detection: Detection,
    pub embedding: Embedding,
}

/// Full pipeline: detect faces → align → encode
pub struct Pipeline {
    pub detector: Session,
    pub encoder: Session,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Pipeline {
    pub fn new(paths: &ModelPaths) -> Result<Self> {
        Ok(Self {
            detector: model::detector_session(&paths.detector)?,
            encoder: model::recognizer_session(&paths.recognizer)?,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        })
    }

    pub fn with_thresholds(mut self, score_threshold: f32, nms_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self.nms_threshold = nms_threshold;
        self
    }

    /// Embed every face found in `img`, best detection first.
    ///
    /// Finding no face is not an error; the result is simply empty.
    pub fn represent(&mut self, img: &DynamicImage) -> Result<Vec<FaceRepresentation>> {
        let detections = face::detect_faces(
            &mut self.detector,
            img,
            self.score_threshold,
            self.nms_threshold,
        )
        .context("detecting faces")?;

        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            let crop = face::align_face(img, &detection, face::ALIGNED_SIZE)
                .context("aligning face")?;
            let embedding =
                face::encode_face(&mut self.encoder, &crop).context("encoding face")?;
            faces.push(FaceRepresentation {
                detection,
                embedding,
            });
        }

        log::debug!("represented {} face(s)", faces.len());
        Ok(faces)
    }

    pub fn represent_path(&mut self, path: &Path) -> Result<Vec<FaceRepresentation>> {
        let img = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
        self.represent(&img)
    }
}
