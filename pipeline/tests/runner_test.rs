use analytics::RecommendationRequest;
use async_trait::async_trait;
use pipeline::{BatchRunner, PipelineError, Stage};
use std::sync::Arc;
use storage::{EdgeSink, EdgeStore, GraphSource, InMemorySource, SourceError};
use touchgraph_core::config::{AppConfig, ExclusionPolicy};
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{
    Activity, AttributionModel, Individual, Lead, SimilarityMeasure, Touch,
};

/// Individuals 1-3 unconverted, 4-6 converted with touches, 7 converted
/// without any touch.
fn campaign_source() -> InMemorySource {
    let individuals = (1..=7)
        .map(|id| Individual::new(id, format!("First{id}"), format!("Last{id}")))
        .collect();
    let activities = vec![
        Activity::new(10, "Email"),
        Activity::new(11, "Webinar"),
        Activity::new(12, "Trial"),
        Activity::new(13, "Demo"),
        Activity::new(14, "Email"),
    ];
    let touches = vec![
        Touch::new(10, 1, 1),
        Touch::new(11, 1, 2),
        Touch::new(10, 2, 1),
        Touch::new(12, 2, 3),
        Touch::new(10, 4, 1),
        Touch::new(12, 4, 5),
        Touch::new(10, 5, 1),
        Touch::new(11, 5, 2),
        Touch::new(13, 5, 9),
        Touch::new(11, 6, 3),
        Touch::new(14, 6, 8),
    ];
    let conversions = vec![
        Lead { id: 40, individual: 4 },
        Lead { id: 50, individual: 5 },
        Lead { id: 60, individual: 6 },
        Lead { id: 70, individual: 7 },
    ];
    InMemorySource::from_parts(individuals, activities, touches, conversions)
}

fn runner_with(source: Arc<dyn GraphSource>, store: Arc<EdgeStore>) -> BatchRunner {
    touchgraph_core::init_tracing();
    BatchRunner::from_config(source, store, &AppConfig::default())
}

#[tokio::test]
async fn test_full_run_reports_every_stage() {
    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(Arc::new(campaign_source()), store.clone());

    let report = runner.run(&RecommendationRequest::default()).await.unwrap();

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Load, Stage::Attribution, Stage::Similarity, Stage::Recommendation]
    );

    let attribution = report.stage(Stage::Attribution).unwrap();
    assert_eq!(attribution.produced, 20);
    assert_eq!(attribution.skipped, 1, "lead 70 has no touches");
    assert_eq!(attribution.commit.unwrap().inserted, 20);
    assert_eq!(store.attribution_len(), 20);

    let last_touch = store
        .attribution_edges(AttributionModel::LastTouch)
        .await
        .unwrap();
    assert_eq!(last_touch.len(), 3);

    assert!(!report.recommendations.is_empty());
    assert!(report
        .recommendations
        .iter()
        .all(|r| r.target_individual_id <= 3));
    let for_first: Vec<&str> = report
        .recommendations
        .iter()
        .filter(|r| r.target_individual_id == 1)
        .map(|r| r.activity_id.as_str())
        .collect();
    assert!(for_first.contains(&"Email"), "node 14 is a different Email node");

    let metrics = runner.metrics();
    assert_eq!(metrics.total_runs, 1);
    assert_eq!(metrics.failed_runs, 0);
    assert!(metrics.stage("similarity").is_some());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(Arc::new(campaign_source()), store.clone());
    let request = RecommendationRequest::default();

    let first = runner.run(&request).await.unwrap();
    let attribution_before =
        serde_json::to_string(&store.attribution_edges(AttributionModel::ExpDecay).await.unwrap())
            .unwrap();
    let similarity_before =
        serde_json::to_string(&store.similarity_edges(SimilarityMeasure::Cosine).await.unwrap())
            .unwrap();

    let second = runner.run(&request).await.unwrap();

    for stage in [Stage::Attribution, Stage::Similarity] {
        let commit = second.stage(stage).unwrap().commit.unwrap();
        assert_eq!(commit.written(), 0, "{stage}");
        assert_eq!(commit.pruned, 0, "{stage}");
    }
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(
        attribution_before,
        serde_json::to_string(&store.attribution_edges(AttributionModel::ExpDecay).await.unwrap())
            .unwrap()
    );
    assert_eq!(
        similarity_before,
        serde_json::to_string(&store.similarity_edges(SimilarityMeasure::Cosine).await.unwrap())
            .unwrap()
    );
}

#[tokio::test]
async fn test_new_touch_replaces_stale_last_touch() {
    let source = Arc::new(campaign_source());
    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(source.clone(), store.clone());
    runner.run(&RecommendationRequest::default()).await.unwrap();

    source.push_touch(Touch::new(11, 4, 20)).await;
    let report = runner.run(&RecommendationRequest::default()).await.unwrap();

    let last_touch = store
        .attribution_edges(AttributionModel::LastTouch)
        .await
        .unwrap();
    let for_lead: Vec<_> = last_touch.iter().filter(|e| e.lead == 40).collect();
    assert_eq!(for_lead.len(), 1);
    assert_eq!(for_lead[0].activity, 11);
    assert_eq!(for_lead[0].total_touches, 3);
    assert!(report.stage(Stage::Attribution).unwrap().commit.unwrap().pruned > 0);
}

struct UnreachableSource;

#[async_trait]
impl GraphSource for UnreachableSource {
    async fn list_individuals(&self) -> Result<Vec<Individual>, SourceError> {
        Ok(Vec::new())
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, SourceError> {
        Ok(Vec::new())
    }

    async fn list_touches(&self) -> Result<Vec<Touch>, SourceError> {
        Err(SourceError::Unavailable("connection refused".to_string()))
    }

    async fn list_conversions(&self) -> Result<Vec<Lead>, SourceError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_unreachable_source_fails_load_and_keeps_committed_edges() {
    let store = Arc::new(EdgeStore::default());
    runner_with(Arc::new(campaign_source()), store.clone())
        .run(&RecommendationRequest::default())
        .await
        .unwrap();
    let committed = store.attribution_len();

    let runner = runner_with(Arc::new(UnreachableSource), store.clone());
    let err = runner
        .run(&RecommendationRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Load));
    assert_eq!(err.error_code(), ErrorCode::Unavailable);
    assert!(err.to_string().contains("load stage failed"));
    assert_eq!(store.attribution_len(), committed);
    assert_eq!(runner.metrics().failed_runs, 1);
}

#[tokio::test]
async fn test_malformed_source_is_data_loss() {
    let source = campaign_source();
    source.push_touch(Touch::new(99, 1, 1)).await;
    let store = Arc::new(EdgeStore::default());

    let err = runner_with(Arc::new(source), store.clone())
        .run(&RecommendationRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Source {
            stage: Stage::Load,
            source: SourceError::Malformed(_)
        }
    ));
    assert_eq!(err.error_code(), ErrorCode::DataLoss);
    assert_eq!(store.attribution_len(), 0);
    assert_eq!(store.similarity_len(), 0);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_any_stage() {
    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(Arc::new(campaign_source()), store.clone());
    let request = RecommendationRequest {
        neighbor_limit: Some(0),
        ..Default::default()
    };

    let err = runner.run(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert_eq!(err.stage(), None);
    assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    assert_eq!(store.attribution_len(), 0);
}

#[tokio::test]
async fn test_request_overrides_exclusion_policy() {
    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(Arc::new(campaign_source()), store.clone());
    let request = RecommendationRequest {
        target_ids: vec![1],
        exclusion: Some(ExclusionPolicy::ActivityId),
        ..Default::default()
    };

    let report = runner.run(&request).await.unwrap();
    assert!(report
        .recommendations
        .iter()
        .all(|r| r.target_individual_id == 1 && r.activity_id != "Email"));
}

#[tokio::test]
async fn test_long_touch_history_commits_attribution() {
    let source = campaign_source();
    source.push_individual(Individual::new(8, "Lola", "Long")).await;
    for n in 0..1100u64 {
        let activity = 10_000 + n;
        source.push_activity(Activity::new(activity, format!("act-{n}"))).await;
        source.push_touch(Touch::new(activity, 8, n as i64)).await;
    }
    source.push_conversion(Lead { id: 80, individual: 8 }).await;

    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(Arc::new(source), store.clone());
    let graph = runner.load().await.unwrap();
    let report = runner.attribute(&graph).await.unwrap();

    assert_eq!(report.commit.unwrap().inserted, report.produced);
    let decay = store
        .attribution_edges(AttributionModel::ExpDecay)
        .await
        .unwrap();
    assert!(decay.iter().filter(|e| e.lead == 80).count() < 1100);
    assert!(decay.iter().all(|e| e.weight > 0.0));
}

#[tokio::test]
async fn test_batch_rejects_measure_that_is_not_scored() {
    let store = Arc::new(EdgeStore::default());
    let runner = runner_with(Arc::new(campaign_source()), store.clone());
    let request = RecommendationRequest {
        measure: Some(SimilarityMeasure::Jaccard),
        ..Default::default()
    };

    let err = runner.run(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    assert_eq!(store.attribution_len(), 0);
    assert_eq!(store.similarity_len(), 0);
}
