use anyhow::Result;
use facesift_vision::{ModelPaths, Pipeline};
use image::{DynamicImage, RgbImage};

/// Models are not checked in; point FACESIFT_MODEL_DIR at a directory holding them.
fn model_paths() -> Option<ModelPaths> {
    let dir = std::env::var("FACESIFT_MODEL_DIR").unwrap_or_else(|_| "models".to_string());
    let paths = ModelPaths::in_dir(dir);
    if paths.exist() {
        Some(paths)
    } else {
        eprintln!("Skipping: ONNX models not found");
        None
    }
}

#[test]
fn test_pipeline_initialization() -> Result<()> {
    let Some(paths) = model_paths() else {
        return Ok(());
    };
    let _pipeline = Pipeline::new(&paths)?;
    Ok(())
}

#[test]
fn test_blank_image_has_no_faces() -> Result<()> {
    env_logger::try_init().ok();
    let Some(paths) = model_paths() else {
        return Ok(());
    };
    let mut pipeline = Pipeline::new(&paths)?;

    let blank = DynamicImage::ImageRgb8(RgbImage::new(320, 240));
    let faces = pipeline.represent(&blank)?;
    assert!(faces.is_empty(), "expected no faces, got {}", faces.len());
    Ok(())
}

#[test]
fn test_missing_models_fail_to_load() {
    let paths = ModelPaths::in_dir("/nonexistent/facesift-models");
    assert!(!paths.exist());
    assert!(Pipeline::new(&paths).is_err());
}
