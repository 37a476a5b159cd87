//! Percentile-based cutoff from a random sample of candidates.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::catalog::Candidate;
use crate::error::SiftError;
use crate::extract::extract;
use crate::provider::EmbeddingProvider;
use crate::references::ReferenceSet;
use crate::similarity::score;

/// Acceptance cutoff and the sample statistics it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    pub cutoff: f32,
    /// Share of the sample, in percent, meant to reach the cutoff.
    pub percentile: f32,
    pub min: f32,
    pub max: f32,
    /// Candidates drawn.
    pub sampled: usize,
    /// Sampled candidates that produced a score.
    pub scored: usize,
}

/// `q`-th percentile of `values` with linear interpolation between the two
/// nearest ranks. `None` for an empty slice.
pub fn percentile(values: &[f32], q: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    let rank = f64::from(q.clamp(0.0, 100.0)) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (rank.ceil() as usize).min(sorted.len() - 1);
    let frac = rank - lo as f64;

    let (a, b) = (f64::from(sorted[lo]), f64::from(sorted[hi]));
    Some((a + (b - a) * frac) as f32)
}

/// Score a uniform sample of `candidates` and place the cutoff so that about
/// `keep_percent` percent of the sampled scores reach it.
pub fn calibrate<P, R>(
    candidates: &[Candidate],
    sample_size: usize,
    keep_percent: f32,
    provider: &mut P,
    references: &ReferenceSet,
    rng: &mut R,
) -> Result<Baseline, SiftError>
where
    P: EmbeddingProvider + ?Sized,
    R: Rng + ?Sized,
{
    if !(0.0..=100.0).contains(&keep_percent) {
        return Err(SiftError::InvalidPercentile(keep_percent));
    }

    let sample: Vec<&Candidate> = candidates.choose_multiple(rng, sample_size).collect();
    debug!(
        "Sampling {} of {} candidate(s) for the baseline",
        sample.len(),
        candidates.len()
    );

    let mut scores = Vec::with_capacity(sample.len());
    for candidate in &sample {
        let Some(embedding) = extract(provider, &candidate.path) else {
            continue;
        };
        match score(&embedding, references) {
            Ok(s) => scores.push(s),
            Err(e) => debug!("{} left out of the baseline: {}", candidate.display_name(), e),
        }
    }

    let empty = || SiftError::EmptyBaseline {
        sampled: sample.len(),
    };
    let cutoff = percentile(&scores, 100.0 - keep_percent).ok_or_else(empty)?;
    let min = scores.iter().copied().reduce(f32::min).ok_or_else(empty)?;
    let max = scores.iter().copied().reduce(f32::max).ok_or_else(empty)?;

    debug!("Sample Score Range: Min={:.4} Max={:.4}", min, max);
    debug!(
        "Using percentile threshold {}% -> Cutoff: {:.4}",
        keep_percent, cutoff
    );

    Ok(Baseline {
        cutoff,
        percentile: keep_percent,
        min,
        max,
        sampled: sample.len(),
        scored: scores.len(),
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::provider::testing::ScriptedProvider;
    use crate::Embedding;

    fn tenths() -> Vec<f32> {
        (1..=10).map(|i| i as f32 / 10.0).collect()
    }

    fn candidate(name: &str) -> Candidate {
        Candidate::from_path(format!("/in/{name}").into()).unwrap()
    }

    fn axis_refs() -> ReferenceSet {
        ReferenceSet::new(vec![Embedding::from(vec![1.0, 0.0])]).unwrap()
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = tenths();
        assert!((percentile(&values, 90.0).unwrap() - 0.91).abs() < 1e-5);
        assert!((percentile(&values, 50.0).unwrap() - 0.55).abs() < 1e-5);
        assert!((percentile(&values, 0.0).unwrap() - 0.1).abs() < 1e-6);
        assert!((percentile(&values, 100.0).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn percentile_ignores_input_order() {
        let mut values = tenths();
        values.reverse();
        assert!((percentile(&values, 90.0).unwrap() - 0.91).abs() < 1e-5);
        assert_eq!(percentile(&[0.42], 37.0), Some(0.42));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn cutoff_keeps_top_share() {
        // one candidate per tenth: cos(angle) = i / 10
        let mut provider = ScriptedProvider::default();
        let mut candidates = Vec::new();
        for (i, s) in tenths().into_iter().enumerate() {
            let name = format!("c{i}.jpg");
            provider = provider.face(&name, vec![s, (1.0 - s * s).sqrt()]);
            candidates.push(candidate(&name));
        }

        let mut rng = StdRng::seed_from_u64(7);
        let baseline =
            calibrate(&candidates, 100, 10.0, &mut provider, &axis_refs(), &mut rng).unwrap();

        assert!((baseline.cutoff - 0.91).abs() < 1e-4);
        assert!((baseline.min - 0.1).abs() < 1e-5);
        assert!((baseline.max - 1.0).abs() < 1e-5);
        assert_eq!(baseline.sampled, 10);
        assert_eq!(baseline.scored, 10);
    }

    #[test]
    fn extreme_percentiles_pick_max_and_min() {
        let mut provider = ScriptedProvider::default()
            .face("a.jpg", vec![1.0, 0.0])
            .face("b.jpg", vec![0.0, 1.0]);
        let candidates = vec![candidate("a.jpg"), candidate("b.jpg")];
        let mut rng = StdRng::seed_from_u64(1);

        let strict = calibrate(&candidates, 5, 0.0, &mut provider, &axis_refs(), &mut rng).unwrap();
        assert!((strict.cutoff - 1.0).abs() < 1e-6);

        let lax = calibrate(&candidates, 5, 100.0, &mut provider, &axis_refs(), &mut rng).unwrap();
        assert!(lax.cutoff.abs() < 1e-6);
    }

    #[test]
    fn sample_is_bounded_and_without_replacement() {
        let mut provider = ScriptedProvider::default();
        let mut candidates = Vec::new();
        for i in 0..20 {
            let name = format!("c{i}.jpg");
            provider = provider.face(&name, vec![1.0, i as f32]);
            candidates.push(candidate(&name));
        }

        let mut rng = StdRng::seed_from_u64(99);
        let baseline =
            calibrate(&candidates, 5, 10.0, &mut provider, &axis_refs(), &mut rng).unwrap();
        assert_eq!(baseline.sampled, 5);

        let mut seen = provider.calls.clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn faceless_samples_do_not_count() {
        let mut provider = ScriptedProvider::default()
            .face("face.jpg", vec![1.0, 0.0])
            .faces("crowd.jpg", vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .broken("bad.jpg", "io error");
        let candidates = vec![
            candidate("face.jpg"),
            candidate("crowd.jpg"),
            candidate("bad.jpg"),
            candidate("empty.jpg"),
        ];

        let mut rng = StdRng::seed_from_u64(3);
        let baseline =
            calibrate(&candidates, 10, 10.0, &mut provider, &axis_refs(), &mut rng).unwrap();
        assert_eq!(baseline.sampled, 4);
        assert_eq!(baseline.scored, 1);
        assert!((baseline.cutoff - 1.0).abs() < 1e-6);
    }

    #[test]
    fn no_usable_score_is_fatal() {
        let mut provider = ScriptedProvider::default().face("zero.jpg", vec![0.0, 0.0]);
        let candidates = vec![candidate("zero.jpg"), candidate("none.jpg")];
        let mut rng = StdRng::seed_from_u64(3);

        let err = calibrate(&candidates, 10, 10.0, &mut provider, &axis_refs(), &mut rng)
            .unwrap_err();
        assert_eq!(err, SiftError::EmptyBaseline { sampled: 2 });

        let err = calibrate(&[], 10, 10.0, &mut provider, &axis_refs(), &mut rng).unwrap_err();
        assert_eq!(err, SiftError::EmptyBaseline { sampled: 0 });
    }

    #[test]
    fn invalid_percentile_is_rejected() {
        let mut provider = ScriptedProvider::default();
        let mut rng = StdRng::seed_from_u64(0);
        let err = calibrate(&[], 10, 101.0, &mut provider, &axis_refs(), &mut rng).unwrap_err();
        assert_eq!(err, SiftError::InvalidPercentile(101.0));
    }
}
