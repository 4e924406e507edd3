use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use thiserror::Error;
use tokio::sync::Mutex;
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{
    AttributionEdge, AttributionKey, AttributionModel, SimilarityEdge, SimilarityKey,
    SimilarityMeasure,
};
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("edge rejected: {0}")]
    Rejected(String),
    #[error("edge sink unavailable: {0}")]
    Unavailable(String),
}

impl TouchgraphError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Rejected(_) => ErrorCode::InvalidArgument,
            StoreError::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}

/// Outcome of one commit against the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub pruned: usize,
}

impl CommitStats {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Destination for derived edges. A commit covers one stage's output for the
/// given scope and is applied entirely or not at all.
#[async_trait]
pub trait EdgeSink: Send + Sync {
    async fn commit_attribution(
        &self,
        models: &[AttributionModel],
        edges: Vec<AttributionEdge>,
    ) -> Result<CommitStats, StoreError>;

    async fn commit_similarity(
        &self,
        measure: SimilarityMeasure,
        edges: Vec<SimilarityEdge>,
    ) -> Result<CommitStats, StoreError>;

    async fn attribution_edges(
        &self,
        model: AttributionModel,
    ) -> Result<Vec<AttributionEdge>, StoreError>;

    async fn similarity_edges(
        &self,
        measure: SimilarityMeasure,
    ) -> Result<Vec<SimilarityEdge>, StoreError>;
}

/// In-memory edge store with upsert-by-key semantics.
pub struct EdgeStore {
    attribution: DashMap<AttributionKey, AttributionEdge>,
    similarity: DashMap<SimilarityKey, SimilarityEdge>,
    commit_lock: Mutex<()>,
    prune_stale: bool,
}

impl EdgeStore {
    pub fn new(prune_stale: bool) -> Self {
        Self {
            attribution: DashMap::new(),
            similarity: DashMap::new(),
            commit_lock: Mutex::new(()),
            prune_stale,
        }
    }

    pub fn attribution_len(&self) -> usize {
        self.attribution.len()
    }

    pub fn similarity_len(&self) -> usize {
        self.similarity.len()
    }

    /// Looks up one stored similarity regardless of argument order.
    pub fn similarity_between(
        &self,
        first: u64,
        second: u64,
        measure: SimilarityMeasure,
    ) -> Option<f64> {
        let key = SimilarityKey {
            low: first.min(second),
            high: first.max(second),
            measure,
        };
        self.similarity.get(&key).map(|edge| edge.similarity)
    }
}

impl Default for EdgeStore {
    fn default() -> Self {
        Self::new(true)
    }
}

fn validate_attribution(
    models: &[AttributionModel],
    edges: &[AttributionEdge],
) -> Result<(), StoreError> {
    for edge in edges {
        if !models.contains(&edge.attribution_model) {
            return Err(StoreError::Rejected(format!(
                "model {} outside commit scope",
                edge.attribution_model
            )));
        }
        if !edge.weight.is_finite() || edge.weight <= 0.0 || edge.weight > 1.0 {
            return Err(StoreError::Rejected(format!(
                "weight {} for lead {} is outside (0, 1]",
                edge.weight, edge.lead
            )));
        }
        if edge.touch_sequence_position == 0
            || edge.touch_sequence_position > edge.total_touches
            || edge.time_sequence_position == 0
            || edge.time_sequence_position > edge.total_touches
        {
            return Err(StoreError::Rejected(format!(
                "sequence position out of range for lead {}",
                edge.lead
            )));
        }
    }
    Ok(())
}

fn validate_similarity(
    measure: SimilarityMeasure,
    edges: &[SimilarityEdge],
) -> Result<(), StoreError> {
    for edge in edges {
        if edge.measure != measure {
            return Err(StoreError::Rejected(format!(
                "measure {} outside commit scope",
                edge.measure
            )));
        }
        if edge.low >= edge.high {
            return Err(StoreError::Rejected(format!(
                "pair ({}, {}) is not normalized",
                edge.low, edge.high
            )));
        }
        if !edge.similarity.is_finite() {
            return Err(StoreError::Rejected(format!(
                "similarity for ({}, {}) is not finite",
                edge.low, edge.high
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl EdgeSink for EdgeStore {
    async fn commit_attribution(
        &self,
        models: &[AttributionModel],
        edges: Vec<AttributionEdge>,
    ) -> Result<CommitStats, StoreError> {
        let _guard = self.commit_lock.lock().await;
        validate_attribution(models, &edges)?;

        let mut stats = CommitStats::default();
        let mut keys = HashSet::with_capacity(edges.len());
        for edge in edges {
            let key = edge.key();
            keys.insert(key);
            apply(&self.attribution, key, edge, &mut stats);
        }

        if self.prune_stale {
            let before = self.attribution.len();
            self.attribution
                .retain(|key, _| !models.contains(&key.model) || keys.contains(key));
            stats.pruned = before - self.attribution.len();
        }

        debug!(?stats, "Committed attribution edges");
        Ok(stats)
    }

    async fn commit_similarity(
        &self,
        measure: SimilarityMeasure,
        edges: Vec<SimilarityEdge>,
    ) -> Result<CommitStats, StoreError> {
        let _guard = self.commit_lock.lock().await;
        validate_similarity(measure, &edges)?;

        let mut stats = CommitStats::default();
        let mut keys = HashSet::with_capacity(edges.len());
        for edge in edges {
            let key = edge.key();
            keys.insert(key);
            apply(&self.similarity, key, edge, &mut stats);
        }

        if self.prune_stale {
            let before = self.similarity.len();
            self.similarity
                .retain(|key, _| key.measure != measure || keys.contains(key));
            stats.pruned = before - self.similarity.len();
        }

        debug!(?stats, %measure, "Committed similarity edges");
        Ok(stats)
    }

    async fn attribution_edges(
        &self,
        model: AttributionModel,
    ) -> Result<Vec<AttributionEdge>, StoreError> {
        let mut out: Vec<AttributionEdge> = self
            .attribution
            .iter()
            .filter(|entry| entry.key().model == model)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(AttributionEdge::key);
        Ok(out)
    }

    async fn similarity_edges(
        &self,
        measure: SimilarityMeasure,
    ) -> Result<Vec<SimilarityEdge>, StoreError> {
        let mut out: Vec<SimilarityEdge> = self
            .similarity
            .iter()
            .filter(|entry| entry.key().measure == measure)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(SimilarityEdge::key);
        Ok(out)
    }
}

fn apply<K, V>(map: &DashMap<K, V>, key: K, value: V, stats: &mut CommitStats)
where
    K: Eq + Hash,
    V: PartialEq,
{
    match map.get_mut(&key) {
        Some(mut existing) => {
            if *existing == value {
                stats.unchanged += 1;
            } else {
                *existing = value;
                stats.updated += 1;
            }
        }
        None => {
            map.insert(key, value);
            stats.inserted += 1;
        }
    }
}
