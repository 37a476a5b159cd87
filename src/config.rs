use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::SiftError;
use crate::store::CollisionPolicy;
use crate::ModelPaths;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "facesift")
}

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACESIFT_CONFIG_PATH") {
    Some(path) => PathBuf::from(path),
    None => project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("facesift.toml")),
});

pub static MODEL_DIR: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACESIFT_MODEL_DIR") {
    Some(path) => PathBuf::from(path),
    None => project_dirs()
        .map(|d| d.data_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from("models")),
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder of exemplar faces.
    pub reference_dir: PathBuf,
    /// Keep roughly the top `percentile` percent of the calibration sample.
    pub percentile: f32,
    /// Candidates drawn for calibration.
    pub sample_size: usize,
    /// Stop after this many selections.
    pub limit: Option<usize>,
    /// Fixes the calibration sample when set.
    pub seed: Option<u64>,
    pub on_collision: CollisionPolicy,
    pub debug: bool,
    pub models: ModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_dir: PathBuf::from("./reference_models"),
            percentile: 10.0,
            sample_size: 100,
            limit: None,
            seed: None,
            on_collision: CollisionPolicy::default(),
            debug: false,
            models: ModelConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), SiftError> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(SiftError::InvalidPercentile(self.percentile));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let paths = ModelPaths::in_dir(MODEL_DIR.as_path());
        Self {
            detector: paths.detector,
            recognizer: paths.recognizer,
            score_threshold: facesift_vision::pipeline::DEFAULT_SCORE_THRESHOLD,
            nms_threshold: facesift_vision::pipeline::DEFAULT_NMS_THRESHOLD,
        }
    }
}

impl ModelConfig {
    pub fn paths(&self) -> ModelPaths {
        ModelPaths {
            detector: self.detector.clone(),
            recognizer: self.recognizer.clone(),
        }
    }
}

/// Load the config file. An explicitly named file must exist; the default
/// location falls back to built-in defaults when absent.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p, true),
        None => (CONFIG_PATH.as_path(), false),
    };
    if !path.exists() {
        if explicit {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}
