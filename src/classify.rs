use std::fmt;
use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::catalog::Candidate;
use crate::extract::extract;
use crate::provider::EmbeddingProvider;
use crate::references::ReferenceSet;
use crate::similarity::score;
use crate::store::FileStore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Pass { score: f32 },
    LowScore { score: f32 },
    /// Zero faces, several faces, or the image could not be processed.
    NoFace,
    /// A face was found but its embedding could not be compared.
    Unscorable,
}

impl Decision {
    pub fn score(&self) -> Option<f32> {
        match self {
            Decision::Pass { score } | Decision::LowScore { score } => Some(*score),
            Decision::NoFace | Decision::Unscorable => None,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Decision::Pass { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Pass { .. } => "PASS",
            Decision::LowScore { .. } => "LOW SCORE",
            Decision::NoFace => "NO SINGLE FACE",
            Decision::Unscorable => "UNSCORABLE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub candidate: Candidate,
    pub decision: Decision,
    /// Where a passing file was copied to, if it was.
    pub stored: Option<PathBuf>,
}

/// Lazily judges candidates against a fixed cutoff, copying the ones that
/// pass. Ends early once `limit` candidates have passed.
pub struct Classifier<'a, P: ?Sized, S: ?Sized> {
    candidates: std::vec::IntoIter<Candidate>,
    cutoff: f32,
    provider: &'a mut P,
    references: &'a ReferenceSet,
    store: &'a mut S,
    limit: Option<usize>,
    passed: usize,
}

impl<'a, P, S> Classifier<'a, P, S>
where
    P: EmbeddingProvider + ?Sized,
    S: FileStore + ?Sized,
{
    pub fn new(
        candidates: Vec<Candidate>,
        cutoff: f32,
        provider: &'a mut P,
        references: &'a ReferenceSet,
        store: &'a mut S,
        limit: Option<usize>,
    ) -> Self {
        Self {
            candidates: candidates.into_iter(),
            cutoff,
            provider,
            references,
            store,
            limit,
            passed: 0,
        }
    }

    /// Candidates not visited yet.
    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    fn judge(&mut self, candidate: &Candidate) -> Decision {
        let Some(embedding) = extract(&mut *self.provider, &candidate.path) else {
            return Decision::NoFace;
        };
        match score(&embedding, self.references) {
            Ok(s) if s >= self.cutoff => Decision::Pass { score: s },
            Ok(s) => Decision::LowScore { score: s },
            Err(e) => {
                warn!("{}: {}", candidate.display_name(), e);
                Decision::Unscorable
            }
        }
    }
}

impl<P, S> Iterator for Classifier<'_, P, S>
where
    P: EmbeddingProvider + ?Sized,
    S: FileStore + ?Sized,
{
    type Item = Verdict;

    fn next(&mut self) -> Option<Verdict> {
        if self.limit.is_some_and(|limit| self.passed >= limit) {
            return None;
        }
        let candidate = self.candidates.next()?;
        let decision = self.judge(&candidate);

        match decision.score() {
            Some(s) => info!("{}: {} | Similarity: {:.4}", decision, candidate.display_name(), s),
            None => info!("{}: {}", decision, candidate.display_name()),
        }

        let mut stored = None;
        if decision.is_pass() {
            self.passed += 1;
            stored = match self.store.store(&candidate.path, &candidate.name) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("{:#}", e);
                    None
                }
            };
        }

        Some(Verdict {
            candidate,
            decision,
            stored,
        })
    }
}
