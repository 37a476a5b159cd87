use std::path::PathBuf;

use anyhow::Result;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::calibrate::{calibrate, Baseline};
use crate::catalog::pending_candidates;
use crate::classify::{Classifier, Decision, Verdict};
use crate::config::Config;
use crate::provider::EmbeddingProvider;
use crate::references::load_references;
use crate::store::FileStore;

/// Tally of one selection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub references: usize,
    pub candidates: usize,
    pub baseline: Option<Baseline>,
    pub passed: usize,
    pub low_score: usize,
    pub no_face: usize,
    pub unscorable: usize,
    /// Left unvisited once the limit was reached.
    pub not_processed: usize,
    pub stored: Vec<PathBuf>,
}

impl RunSummary {
    fn record(&mut self, verdict: Verdict) {
        match verdict.decision {
            Decision::Pass { .. } => self.passed += 1,
            Decision::LowScore { .. } => self.low_score += 1,
            Decision::NoFace => self.no_face += 1,
            Decision::Unscorable => self.unscorable += 1,
        }
        self.stored.extend(verdict.stored);
    }
}

/// Seeded from the config when it names a seed, from the OS otherwise.
pub fn rng_for(config: &Config) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Reference loading, calibration and classification over one input folder.
pub struct Sifter<P, S> {
    config: Config,
    input: PathBuf,
    provider: P,
    store: S,
}

impl<P: EmbeddingProvider, S: FileStore> Sifter<P, S> {
    pub fn new(config: Config, input: impl Into<PathBuf>, provider: P, store: S) -> Self {
        Self {
            config,
            input: input.into(),
            provider,
            store,
        }
    }

    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<RunSummary> {
        self.config.validate()?;
        self.store.prepare()?;

        let references = load_references(&mut self.provider, &self.config.reference_dir)?;

        let candidates = pending_candidates(&self.input, &self.store)?;
        info!(
            "{} image(s) to consider in {}",
            candidates.len(),
            self.input.display()
        );

        let baseline = calibrate(
            &candidates,
            self.config.sample_size,
            self.config.percentile,
            &mut self.provider,
            &references,
            rng,
        )?;

        let mut summary = RunSummary {
            references: references.len(),
            candidates: candidates.len(),
            baseline: Some(baseline),
            ..RunSummary::default()
        };

        // sampled candidates are scored again here, against the cutoff they helped set
        let mut classifier = Classifier::new(
            candidates,
            baseline.cutoff,
            &mut self.provider,
            &references,
            &mut self.store,
            self.config.limit,
        );
        for verdict in classifier.by_ref() {
            summary.record(verdict);
        }
        summary.not_processed = classifier.remaining();

        Ok(summary)
    }

    pub fn into_parts(self) -> (P, S) {
        (self.provider, self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_is_reproducible() {
        let config = Config {
            seed: Some(11),
            ..Config::default()
        };
        let a: u64 = rng_for(&config).gen();
        let b: u64 = rng_for(&config).gen();
        assert_eq!(a, b);
    }

    #[test]
    fn summary_counts_each_decision() {
        let candidate = crate::catalog::Candidate::from_path("/in/a.jpg".into()).unwrap();
        let mut summary = RunSummary::default();
        for (decision, stored) in [
            (Decision::Pass { score: 0.9 }, Some(PathBuf::from("/out/a.jpg"))),
            (Decision::Pass { score: 0.8 }, None),
            (Decision::LowScore { score: 0.1 }, None),
            (Decision::NoFace, None),
            (Decision::Unscorable, None),
        ] {
            summary.record(Verdict {
                candidate: candidate.clone(),
                decision,
                stored,
            });
        }
        assert_eq!(
            (summary.passed, summary.low_score, summary.no_face, summary.unscorable),
            (2, 1, 1, 1)
        );
        assert_eq!(summary.stored, vec![PathBuf::from("/out/a.jpg")]);
    }
}
