use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
#[cfg(any(feature = "openvino", feature = "cuda"))]
use ort::ep::{self, ExecutionProvider};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};

/// File name of the YuNet detector inside a model directory.
pub const DETECTOR_FILE: &str = "face_detection_yunet_2023mar.onnx";
/// File name of the SFace recognizer inside a model directory.
pub const RECOGNIZER_FILE: &str = "face_recognition_sface_2021dec.onnx";

/// Locations of the two ONNX models the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
}

impl ModelPaths {
    /// Both models under their stock file names in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detector: dir.join(DETECTOR_FILE),
            recognizer: dir.join(RECOGNIZER_FILE),
        }
    }

    pub fn exist(&self) -> bool {
        self.detector.is_file() && self.recognizer.is_file()
    }
}

pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

fn session_from_file(path: &Path, what: &str) -> Result<Session> {
    if !path.is_file() {
        anyhow::bail!("{} model not found at {}", what, path.display());
    }
    session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load {} model {}", what, path.display()))
}

pub fn recognizer_session(path: &Path) -> Result<Session> {
    session_from_file(path, "recognition")
}

pub fn detector_session(path: &Path) -> Result<Session> {
    session_from_file(path, "detector")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths_in_dir() {
        let paths = ModelPaths::in_dir("/opt/models");
        assert_eq!(paths.detector, Path::new("/opt/models").join(DETECTOR_FILE));
        assert_eq!(
            paths.recognizer,
            Path::new("/opt/models").join(RECOGNIZER_FILE)
        );
    }

    #[test]
    fn test_missing_model_is_an_error() {
        match detector_session(Path::new("/nonexistent/yunet.onnx")) {
            Ok(_) => panic!("loaded a model that does not exist"),
            Err(err) => assert!(err.to_string().contains("not found")),
        }
    }
}
