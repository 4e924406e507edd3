use crate::recommend::RecommendationRanker;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use touchgraph_core::config::{AnalyticsConfig, ExclusionPolicy};
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{NodeId, SimilarityMeasure};

const MAX_NEIGHBOR_LIMIT: usize = 1_000;

/// Recommendation query. Empty `target_ids` means every unconverted
/// individual; unset fields fall back to the analytics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub target_ids: Vec<NodeId>,
    #[serde(default)]
    pub neighbor_limit: Option<usize>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub measure: Option<SimilarityMeasure>,
    #[serde(default)]
    pub exclusion: Option<ExclusionPolicy>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("neighbor_limit must be between 1 and {0}")]
    InvalidNeighborLimit(usize),
    #[error("max_results must be at least 1 when provided")]
    InvalidMaxResults,
    #[error("target_ids must not contain duplicates (repeated id {0})")]
    DuplicateTarget(NodeId),
    #[error("measure {requested} is not scored by this batch (scoring {scored})")]
    MeasureNotScored {
        requested: SimilarityMeasure,
        scored: SimilarityMeasure,
    },
}

impl TouchgraphError for RequestValidationError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

impl RecommendationRequest {
    pub fn parse_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if let Some(limit) = self.neighbor_limit {
            if limit == 0 || limit > MAX_NEIGHBOR_LIMIT {
                return Err(RequestValidationError::InvalidNeighborLimit(
                    MAX_NEIGHBOR_LIMIT,
                ));
            }
        }
        if self.max_results == Some(0) {
            return Err(RequestValidationError::InvalidMaxResults);
        }
        let mut seen = HashSet::new();
        for id in &self.target_ids {
            if !seen.insert(*id) {
                return Err(RequestValidationError::DuplicateTarget(*id));
            }
        }
        Ok(())
    }

    /// Validation for a full batch, which only scores the configured measure.
    pub fn validate_for_batch(
        &self,
        config: &AnalyticsConfig,
    ) -> Result<(), RequestValidationError> {
        self.validate()?;
        let requested = self.effective_measure(config);
        if requested != config.similarity_measure {
            return Err(RequestValidationError::MeasureNotScored {
                requested,
                scored: config.similarity_measure,
            });
        }
        Ok(())
    }

    pub fn effective_measure(&self, config: &AnalyticsConfig) -> SimilarityMeasure {
        self.measure.unwrap_or(config.similarity_measure)
    }

    /// Builds the ranker for this request on top of `config`.
    pub fn ranker(&self, config: &AnalyticsConfig) -> RecommendationRanker {
        let limit = self.neighbor_limit.unwrap_or(config.neighbor_limit);
        RecommendationRanker::new(self.effective_measure(config), limit)
            .with_exclusion(self.exclusion.unwrap_or(config.exclusion))
            .with_max_results(self.max_results)
    }
}
