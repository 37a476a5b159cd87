use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use facesift::{config, sifter, store, Pipeline};
use log::{debug, info};

#[derive(Parser)]
#[command(name = "facesift")]
#[command(
    version,
    about = "Keep the photos whose face most resembles a set of reference faces"
)]
struct Cli {
    /// Input folder of images
    #[arg(long)]
    input: PathBuf,

    /// Folder to save selected original images
    #[arg(long)]
    output: PathBuf,

    /// Folder containing reference face images
    #[arg(long = "ref")]
    reference: Option<PathBuf>,

    /// Percentile threshold (e.g. 10 for top 10%)
    #[arg(long = "pt")]
    percentile: Option<f32>,

    /// Hosted model token (accepted for compatibility, unused)
    #[arg(long)]
    token: Option<String>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Maximum number of images to select
    #[arg(long)]
    limit: Option<usize>,

    /// Number of random samples for baseline scoring
    #[arg(long)]
    sample: Option<usize>,

    /// Seed for the baseline sample
    #[arg(long)]
    seed: Option<u64>,

    /// What to do when the output already holds a file of the same name
    #[arg(long, value_enum)]
    on_collision: Option<store::CollisionPolicy>,

    /// Config file (defaults to the per-user config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// YuNet detector model
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// SFace recognizer model
    #[arg(long)]
    recognizer_model: Option<PathBuf>,

    /// Minimum detector confidence
    #[arg(long)]
    score_threshold: Option<f32>,

    /// Overlap above which weaker detections are suppressed
    #[arg(long)]
    nms_threshold: Option<f32>,

    /// Write a JSON summary of the run here
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, cfg: &mut config::Config) {
        if let Some(dir) = &self.reference {
            cfg.reference_dir = dir.clone();
        }
        if let Some(pt) = self.percentile {
            cfg.percentile = pt;
        }
        if let Some(limit) = self.limit {
            cfg.limit = Some(limit);
        }
        if let Some(sample) = self.sample {
            cfg.sample_size = sample;
        }
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
        if let Some(policy) = self.on_collision {
            cfg.on_collision = policy;
        }
        if let Some(path) = &self.detector_model {
            cfg.models.detector = path.clone();
        }
        if let Some(path) = &self.recognizer_model {
            cfg.models.recognizer = path.clone();
        }
        if let Some(t) = self.score_threshold {
            cfg.models.score_threshold = t;
        }
        if let Some(t) = self.nms_threshold {
            cfg.models.nms_threshold = t;
        }
        cfg.debug |= self.debug;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;
    cli.apply(&mut cfg);

    env_logger::builder()
        .filter_level(if cfg.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_target(false)
        .format_timestamp(None)
        .init();

    if cli.token.is_some() {
        debug!("--token given; no hosted model is used, ignoring it");
    }
    cfg.validate()?;

    let pipeline = Pipeline::new(&cfg.models.paths())
        .context("Failed to initialize face recognition pipeline")?
        .with_thresholds(cfg.models.score_threshold, cfg.models.nms_threshold);
    let output = store::DirStore::new(&cli.output, cfg.on_collision);

    let mut rng = sifter::rng_for(&cfg);
    let mut sifter = sifter::Sifter::new(cfg, &cli.input, pipeline, output);
    let summary = sifter.run(&mut rng)?;

    info!(
        "✓ {} selected, {} low score, {} without a single face, {} unscorable, {} not processed",
        summary.passed,
        summary.low_score,
        summary.no_face,
        summary.unscorable,
        summary.not_processed
    );

    if let Some(path) = &cli.report {
        let data = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, data)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
