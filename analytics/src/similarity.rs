//! Binary similarity between individuals over their touching activities.
//!
//! For a pair `(i1, i2)` with activity sets `S1`, `S2` out of `V` activities:
//!
//! | count | meaning                 |
//! |-------|-------------------------|
//! | `a`   | in both sets            |
//! | `b`   | only in `S2`            |
//! | `c`   | only in `S1`            |
//! | `d`   | in neither              |
//!
//! Only pairs with `a > 0` are scored. The measure is a pure function of the
//! four counts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use storage::TouchGraph;
use thiserror::Error;
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{NodeId, SimilarityEdge, SimilarityMeasure};
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("{measure} similarity undefined for counts {counts:?}")]
    UndefinedSimilarity {
        measure: SimilarityMeasure,
        counts: BinaryCounts,
    },
}

impl TouchgraphError for ScoreError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
}

impl BinaryCounts {
    /// `shared` activities touched both, `v1`/`v2` the per-individual totals.
    pub fn from_sizes(shared: usize, v1: usize, v2: usize, universe: usize) -> Self {
        Self {
            a: shared,
            b: v2.saturating_sub(shared),
            c: v1.saturating_sub(shared),
            d: (universe + shared).saturating_sub(v1 + v2),
        }
    }

    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d
    }
}

pub fn score(measure: SimilarityMeasure, counts: BinaryCounts) -> Result<f64, ScoreError> {
    let a = counts.a as f64;
    let b = counts.b as f64;
    let c = counts.c as f64;
    let d = counts.d as f64;
    let undefined = || ScoreError::UndefinedSimilarity { measure, counts };

    let ratio = |numerator: f64, denominator: f64| {
        if denominator == 0.0 {
            Err(undefined())
        } else {
            Ok(numerator / denominator)
        }
    };

    let value = match measure {
        SimilarityMeasure::Cosine => ratio(a, ((a + b) * (a + c)).sqrt())?,
        SimilarityMeasure::Jaccard => ratio(a, a + b + c)?,
        SimilarityMeasure::Dice => ratio(2.0 * a, 2.0 * a + b + c)?,
        SimilarityMeasure::Euclidean => (b + c).sqrt(),
        SimilarityMeasure::Manhattan => b + c,
        SimilarityMeasure::SokalMichener => ratio(a + d, a + b + c + d)?,
        SimilarityMeasure::Faith => ratio(a + 0.5 * d, a + b + c + d)?,
        SimilarityMeasure::Ample => ratio(a * (c + d), c * (a + b))?.abs(),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(undefined())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOutcome {
    pub edges: Vec<SimilarityEdge>,
    pub pairs_evaluated: usize,
    pub undefined: usize,
}

pub struct SimilarityScorer {
    measure: SimilarityMeasure,
}

impl SimilarityScorer {
    pub fn new(measure: SimilarityMeasure) -> Self {
        Self { measure }
    }

    pub fn measure(&self) -> SimilarityMeasure {
        self.measure
    }

    /// Scores every pair of individuals that share at least one activity.
    ///
    /// Candidate pairs come from the activity -> individuals index, so pairs
    /// with nothing in common are never visited. The lower id is always `i1`.
    pub fn run(&self, graph: &TouchGraph) -> SimilarityOutcome {
        let universe = graph.activity_count();
        let mut shared: HashMap<(NodeId, NodeId), usize> = HashMap::new();

        for activity in graph.activity_ids() {
            let Some(touched) = graph.touched_by(activity) else {
                continue;
            };
            let members: Vec<NodeId> = touched.iter().copied().collect();
            for (idx, low) in members.iter().enumerate() {
                for high in &members[idx + 1..] {
                    *shared.entry((*low, *high)).or_insert(0) += 1;
                }
            }
        }

        let mut pairs: Vec<((NodeId, NodeId), usize)> = shared.into_iter().collect();
        pairs.sort_unstable_by_key(|(pair, _)| *pair);

        let mut outcome = SimilarityOutcome {
            pairs_evaluated: pairs.len(),
            ..SimilarityOutcome::default()
        };

        for ((low, high), a) in pairs {
            let v1 = graph.activity_set(low).map_or(0, BTreeSet::len);
            let v2 = graph.activity_set(high).map_or(0, BTreeSet::len);
            let counts = BinaryCounts::from_sizes(a, v1, v2, universe);

            match score(self.measure, counts) {
                Ok(similarity) => {
                    if let Some(edge) = SimilarityEdge::between(low, high, similarity, self.measure)
                    {
                        outcome.edges.push(edge);
                    }
                }
                Err(err) => {
                    debug!(low, high, "Skipping pair: {}", err);
                    outcome.undefined += 1;
                }
            }
        }

        debug!(
            measure = %self.measure,
            pairs = outcome.pairs_evaluated,
            edges = outcome.edges.len(),
            undefined = outcome.undefined,
            "Similarity scoring finished"
        );
        outcome
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(SimilarityMeasure::Cosine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(a: usize, b: usize, c: usize, d: usize) -> BinaryCounts {
        BinaryCounts { a, b, c, d }
    }

    #[test]
    fn test_counts_from_sizes() {
        // {1, 2, 3} against {2, 3, 4} out of 10 activities
        assert_eq!(BinaryCounts::from_sizes(2, 3, 3, 10), counts(2, 1, 1, 6));
        assert_eq!(counts(2, 1, 1, 6).total(), 10);
    }

    #[test]
    fn test_cosine_matches_hand_computation() {
        let value = score(SimilarityMeasure::Cosine, counts(2, 1, 1, 6)).unwrap();
        assert!((value - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_alternative_measures() {
        let c = counts(2, 1, 1, 6);
        let check = |measure, expected: f64| {
            let value = score(measure, c).unwrap();
            assert!((value - expected).abs() < 1e-12, "{measure}: {value}");
        };
        check(SimilarityMeasure::Jaccard, 0.5);
        check(SimilarityMeasure::Dice, 4.0 / 6.0);
        check(SimilarityMeasure::Euclidean, 2f64.sqrt());
        check(SimilarityMeasure::Manhattan, 2.0);
        check(SimilarityMeasure::SokalMichener, 0.8);
        check(SimilarityMeasure::Faith, 0.5);
        check(SimilarityMeasure::Ample, (2.0 * 7.0) / 3.0);
    }

    #[test]
    fn test_zero_denominator_is_undefined() {
        // i1's activities are a subset of i2's: c = 0
        let err = score(SimilarityMeasure::Ample, counts(2, 1, 0, 7)).unwrap_err();
        assert!(matches!(err, ScoreError::UndefinedSimilarity { .. }));

        let err = score(SimilarityMeasure::Cosine, counts(0, 0, 0, 5)).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::UndefinedSimilarity {
                measure: SimilarityMeasure::Cosine,
                ..
            }
        ));
    }

    #[test]
    fn test_symmetric_measures_ignore_argument_order() {
        let forward = counts(3, 2, 5, 10);
        let backward = counts(3, 5, 2, 10);
        for measure in SimilarityMeasure::ALL {
            if measure == SimilarityMeasure::Ample {
                continue;
            }
            assert_eq!(score(measure, forward), score(measure, backward), "{measure}");
        }
    }
}
