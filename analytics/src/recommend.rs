//! k-NN activity recommendations for unconverted individuals.
//!
//! For each target the ranker collects converted neighbours through the
//! similarity edges, maps each neighbour to the activity its conversion was
//! last-touch attributed to, drops activities that already touched the target,
//! keeps the `k` highest-scoring neighbours and finally groups their votes by
//! `activity_id`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use storage::TouchGraph;
use touchgraph_core::config::{AnalyticsConfig, ExclusionPolicy};
use touchgraph_core::model::{
    AttributionEdge, AttributionModel, NodeId, Recommendation, SimilarityEdge, SimilarityMeasure,
};
use tracing::{debug, warn};

pub const DEFAULT_NEIGHBOR_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Neighbor {
    id: NodeId,
    similarity: f64,
    activity: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankerOutcome {
    pub recommendations: Vec<Recommendation>,
    pub targets_considered: usize,
    pub targets_without_candidates: usize,
}

pub struct RecommendationRanker {
    measure: SimilarityMeasure,
    neighbor_limit: usize,
    exclusion: ExclusionPolicy,
    max_results: Option<usize>,
}

impl RecommendationRanker {
    pub fn new(measure: SimilarityMeasure, neighbor_limit: usize) -> Self {
        Self {
            measure,
            neighbor_limit: neighbor_limit.max(1),
            exclusion: ExclusionPolicy::NodeIdentity,
            max_results: None,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.similarity_measure, config.neighbor_limit).with_exclusion(config.exclusion)
    }

    pub fn with_exclusion(mut self, exclusion: ExclusionPolicy) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Caps the number of activities emitted per target.
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn measure(&self) -> SimilarityMeasure {
        self.measure
    }

    /// Ranks every unconverted individual in the snapshot.
    pub fn rank(
        &self,
        graph: &TouchGraph,
        similarity: &[SimilarityEdge],
        attribution: &[AttributionEdge],
    ) -> RankerOutcome {
        let targets: Vec<NodeId> = graph.unconverted_ids().collect();
        self.rank_targets(graph, &targets, similarity, attribution)
    }

    /// Ranks only `targets`; converted or unknown ids are ignored.
    pub fn rank_targets(
        &self,
        graph: &TouchGraph,
        targets: &[NodeId],
        similarity: &[SimilarityEdge],
        attribution: &[AttributionEdge],
    ) -> RankerOutcome {
        let last_touch = last_touch_activities(attribution);
        let adjacency = self.neighbor_index(similarity);

        let mut ordered: Vec<NodeId> = targets
            .iter()
            .copied()
            .filter(|id| graph.individual(*id).is_some() && !graph.is_converted(*id))
            .collect();
        ordered.sort_unstable();
        ordered.dedup();

        let mut outcome = RankerOutcome {
            targets_considered: ordered.len(),
            ..RankerOutcome::default()
        };

        for target in ordered {
            let recs = self.rank_one(graph, target, &adjacency, &last_touch);
            if recs.is_empty() {
                outcome.targets_without_candidates += 1;
            }
            outcome.recommendations.extend(recs);
        }

        debug!(
            measure = %self.measure,
            targets = outcome.targets_considered,
            recommendations = outcome.recommendations.len(),
            "Recommendation ranking finished"
        );
        outcome
    }

    fn neighbor_index(&self, similarity: &[SimilarityEdge]) -> HashMap<NodeId, Vec<(NodeId, f64)>> {
        let mut adjacency: HashMap<NodeId, Vec<(NodeId, f64)>> = HashMap::new();
        for edge in similarity.iter().filter(|e| e.measure == self.measure) {
            adjacency
                .entry(edge.low)
                .or_default()
                .push((edge.high, edge.similarity));
            adjacency
                .entry(edge.high)
                .or_default()
                .push((edge.low, edge.similarity));
        }
        adjacency
    }

    fn rank_one(
        &self,
        graph: &TouchGraph,
        target: NodeId,
        adjacency: &HashMap<NodeId, Vec<(NodeId, f64)>>,
        last_touch: &HashMap<NodeId, NodeId>,
    ) -> Vec<Recommendation> {
        let Some(individual) = graph.individual(target) else {
            return Vec::new();
        };
        let Some(edges) = adjacency.get(&target) else {
            return Vec::new();
        };

        let excluded = self.excluded_for(graph, target);

        let mut neighbors: Vec<Neighbor> = edges
            .iter()
            .filter(|(id, _)| graph.is_converted(*id))
            .filter_map(|(id, similarity)| {
                last_touch.get(id).map(|activity| Neighbor {
                    id: *id,
                    similarity: *similarity,
                    activity: *activity,
                })
            })
            .filter(|n| !excluded.nodes.contains(&n.activity))
            .filter(|n| match graph.activity(n.activity) {
                Some(activity) => !excluded.activity_ids.contains(activity.activity_id.as_str()),
                None => {
                    warn!(activity = n.activity, "Attributed activity missing from snapshot");
                    false
                }
            })
            .collect();

        neighbors.sort_by(|x, y| descending(x.similarity, y.similarity).then(x.id.cmp(&y.id)));
        neighbors.truncate(self.neighbor_limit);

        let mut groups: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for neighbor in &neighbors {
            let Some(activity) = graph.activity(neighbor.activity) else {
                continue;
            };
            let entry = groups.entry(activity.activity_id.as_str()).or_insert((0.0, 0));
            entry.0 += neighbor.similarity;
            entry.1 += 1;
        }

        let mut recs: Vec<Recommendation> = groups
            .into_iter()
            .map(|(activity_id, (sum, count))| Recommendation {
                target_individual_id: target,
                first_name: individual.first_name.clone(),
                last_name: individual.last_name.clone(),
                activity_id: activity_id.to_string(),
                avg_similarity: round3(sum / count as f64),
                neighbor_count: count,
                measure: self.measure,
            })
            .collect();

        recs.sort_by(|x, y| {
            descending(x.avg_similarity, y.avg_similarity)
                .then(y.neighbor_count.cmp(&x.neighbor_count))
                .then(x.activity_id.cmp(&y.activity_id))
        });
        if let Some(max) = self.max_results {
            recs.truncate(max);
        }
        recs
    }

    fn excluded_for<'g>(&self, graph: &'g TouchGraph, target: NodeId) -> Exclusions<'g> {
        let nodes: BTreeSet<NodeId> = graph.activity_set(target).cloned().unwrap_or_default();
        let activity_ids = match self.exclusion {
            ExclusionPolicy::NodeIdentity => BTreeSet::new(),
            ExclusionPolicy::ActivityId => nodes
                .iter()
                .filter_map(|id| graph.activity(*id))
                .map(|activity| activity.activity_id.as_str())
                .collect(),
        };
        Exclusions {
            nodes,
            activity_ids,
        }
    }
}

impl Default for RecommendationRanker {
    fn default() -> Self {
        Self::new(SimilarityMeasure::Cosine, DEFAULT_NEIGHBOR_LIMIT)
    }
}

/// Larger scores first for every measure, distances included.
fn descending(x: f64, y: f64) -> Ordering {
    y.partial_cmp(&x).unwrap_or(Ordering::Equal)
}

struct Exclusions<'g> {
    nodes: BTreeSet<NodeId>,
    activity_ids: BTreeSet<&'g str>,
}

/// Individual -> activity credited by the last-touch model. Should more than
/// one edge exist for an individual, the latest sequence position wins, then
/// the lower activity id.
fn last_touch_activities(attribution: &[AttributionEdge]) -> HashMap<NodeId, NodeId> {
    let mut best: HashMap<NodeId, (usize, NodeId)> = HashMap::new();
    for edge in attribution
        .iter()
        .filter(|e| e.attribution_model == AttributionModel::LastTouch)
    {
        let candidate = (edge.touch_sequence_position, edge.activity);
        best.entry(edge.individual)
            .and_modify(|current| {
                if candidate.0 > current.0 || (candidate.0 == current.0 && candidate.1 < current.1)
                {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    best.into_iter()
        .map(|(individual, (_, activity))| (individual, activity))
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
