use crate::report::{RunReport, Stage, StageReport};
use analytics::{
    AttributionEngine, RecommendationRequest, RequestValidationError, SimilarityScorer,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use storage::{load_snapshot, EdgeSink, GraphSource, SourceError, StoreError, TouchGraph};
use thiserror::Error;
use touchgraph_core::config::{AnalyticsConfig, AppConfig};
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::metrics::{MetricsCollector, MetricsSnapshot};
use touchgraph_core::model::{AttributionModel, Recommendation};
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Source {
        stage: Stage,
        #[source]
        source: SourceError,
    },
    #[error("{stage} stage failed: {source}")]
    Sink {
        stage: Stage,
        #[source]
        source: StoreError,
    },
    #[error("invalid recommendation request: {0}")]
    InvalidRequest(#[from] RequestValidationError),
}

impl PipelineError {
    /// Stage that failed, if the failure happened inside one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Source { stage, .. } | PipelineError::Sink { stage, .. } => {
                Some(*stage)
            }
            PipelineError::InvalidRequest(_) => None,
        }
    }
}

impl TouchgraphError for PipelineError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PipelineError::Source { source, .. } => source.error_code(),
            PipelineError::Sink { source, .. } => source.error_code(),
            PipelineError::InvalidRequest(err) => err.error_code(),
        }
    }
}

/// Runs the analytics stages against a data source and commits derived edges
/// to a sink, one commit per stage.
pub struct BatchRunner {
    source: Arc<dyn GraphSource>,
    sink: Arc<dyn EdgeSink>,
    config: AnalyticsConfig,
    metrics: MetricsCollector,
}

impl BatchRunner {
    pub fn new(
        source: Arc<dyn GraphSource>,
        sink: Arc<dyn EdgeSink>,
        config: AnalyticsConfig,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            source,
            sink,
            config,
            metrics,
        }
    }

    pub fn from_config(
        source: Arc<dyn GraphSource>,
        sink: Arc<dyn EdgeSink>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            source,
            sink,
            config.analytics.clone(),
            MetricsCollector::new(config.pipeline.metrics_history),
        )
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn load(&self) -> Result<TouchGraph, PipelineError> {
        let started = Instant::now();
        let graph = load_snapshot(self.source.as_ref())
            .await
            .map_err(|source| PipelineError::Source {
                stage: Stage::Load,
                source,
            })?;
        self.metrics.record_stage(
            Stage::Load.as_str(),
            elapsed_ms(started),
            graph.touch_count(),
            0,
        );
        Ok(graph)
    }

    pub async fn attribute(&self, graph: &TouchGraph) -> Result<StageReport, PipelineError> {
        let started = Instant::now();
        let outcome = AttributionEngine::from_config(&self.config).run(graph);
        let produced = outcome.edges.len();
        let skipped = outcome.skipped.len();

        let commit = self
            .sink
            .commit_attribution(&self.config.models, outcome.edges)
            .await
            .map_err(|source| PipelineError::Sink {
                stage: Stage::Attribution,
                source,
            })?;

        Ok(self.finish(Stage::Attribution, started, produced, skipped, Some(commit)))
    }

    pub async fn score(&self, graph: &TouchGraph) -> Result<StageReport, PipelineError> {
        let started = Instant::now();
        let measure = self.config.similarity_measure;
        let outcome = SimilarityScorer::new(measure).run(graph);
        let produced = outcome.edges.len();

        let commit = self
            .sink
            .commit_similarity(measure, outcome.edges)
            .await
            .map_err(|source| PipelineError::Sink {
                stage: Stage::Similarity,
                source,
            })?;

        Ok(self.finish(
            Stage::Similarity,
            started,
            produced,
            outcome.undefined,
            Some(commit),
        ))
    }

    /// Ranks from whatever attribution and similarity edges the sink holds.
    pub async fn recommend(
        &self,
        graph: &TouchGraph,
        request: &RecommendationRequest,
    ) -> Result<(StageReport, Vec<Recommendation>), PipelineError> {
        request.validate()?;
        let started = Instant::now();
        let ranker = request.ranker(&self.config);
        let sink_error = |source| PipelineError::Sink {
            stage: Stage::Recommendation,
            source,
        };

        let similarity = self
            .sink
            .similarity_edges(ranker.measure())
            .await
            .map_err(sink_error)?;
        let attribution = self
            .sink
            .attribution_edges(AttributionModel::LastTouch)
            .await
            .map_err(sink_error)?;

        let outcome = if request.target_ids.is_empty() {
            ranker.rank(graph, &similarity, &attribution)
        } else {
            ranker.rank_targets(graph, &request.target_ids, &similarity, &attribution)
        };

        let report = self.finish(
            Stage::Recommendation,
            started,
            outcome.recommendations.len(),
            outcome.targets_without_candidates,
            None,
        );
        Ok((report, outcome.recommendations))
    }

    /// Full batch: load, attribution, similarity, recommendation.
    pub async fn run(&self, request: &RecommendationRequest) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        info!("Batch run started");

        let result = self.run_stages(request).await;
        self.metrics.record_run(result.is_ok());

        match result {
            Ok((stages, recommendations)) => {
                let report = RunReport {
                    started_at,
                    stages,
                    recommendations,
                };
                info!(
                    elapsed_ms = report.total_elapsed_ms(),
                    recommendations = report.recommendations.len(),
                    "Batch run finished"
                );
                Ok(report)
            }
            Err(err) => {
                error!(stage = ?err.stage(), "Batch run failed: {}", err);
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &RecommendationRequest,
    ) -> Result<(Vec<StageReport>, Vec<Recommendation>), PipelineError> {
        request.validate_for_batch(&self.config)?;

        let load_started = Instant::now();
        let graph = self.load().await?;
        let load = StageReport {
            stage: Stage::Load,
            elapsed_ms: elapsed_ms(load_started),
            produced: graph.touch_count(),
            skipped: 0,
            commit: None,
        };

        let attribution = self.attribute(&graph).await?;
        let similarity = self.score(&graph).await?;
        let (recommendation, recommendations) = self.recommend(&graph, request).await?;

        Ok((
            vec![load, attribution, similarity, recommendation],
            recommendations,
        ))
    }

    fn finish(
        &self,
        stage: Stage,
        started: Instant,
        produced: usize,
        skipped: usize,
        commit: Option<storage::CommitStats>,
    ) -> StageReport {
        let elapsed_ms = elapsed_ms(started);
        self.metrics
            .record_stage(stage.as_str(), elapsed_ms, produced, skipped);
        info!(
            %stage,
            elapsed_ms,
            produced,
            skipped,
            "Stage finished"
        );
        StageReport {
            stage,
            elapsed_ms,
            produced,
            skipped,
            commit,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
