use analytics::RecommendationRequest;
use pipeline::{BatchRunner, ChannelJobQueue, Job, JobQueue, Stage, Worker};
use std::sync::Arc;
use storage::{EdgeStore, InMemorySource};
use tokio::sync::mpsc;
use touchgraph_core::config::AppConfig;
use touchgraph_core::model::{Activity, Individual, Lead, Touch};

fn small_source() -> InMemorySource {
    InMemorySource::from_parts(
        vec![
            Individual::new(1, "Ann", "Open"),
            Individual::new(2, "Bob", "Closed"),
        ],
        vec![Activity::new(10, "Email"), Activity::new(11, "Webinar")],
        vec![
            Touch::new(10, 1, 1),
            Touch::new(10, 2, 1),
            Touch::new(11, 2, 4),
        ],
        vec![Lead { id: 20, individual: 2 }],
    )
}

#[tokio::test]
async fn test_worker_processes_jobs_in_order() {
    let config = AppConfig::default();
    let store = Arc::new(EdgeStore::default());
    let runner = Arc::new(BatchRunner::from_config(
        Arc::new(small_source()),
        store.clone(),
        &config,
    ));

    let (queue, receiver) = ChannelJobQueue::bounded(config.pipeline.queue_capacity);
    let (outcome_tx, mut outcome_rx) = mpsc::channel(8);
    let handle = tokio::spawn(Worker::new(receiver, runner).with_outcomes(outcome_tx).run());

    queue.enqueue(Job::Attribute).await.unwrap();
    queue.enqueue(Job::ScoreSimilarity).await.unwrap();
    queue
        .enqueue(Job::Recommend {
            request: RecommendationRequest::default(),
        })
        .await
        .unwrap();
    drop(queue);

    let attribute = outcome_rx.recv().await.unwrap();
    assert_eq!(attribute.job, Job::Attribute);
    let (stages, _) = attribute.result.unwrap();
    assert_eq!(stages[0].stage, Stage::Attribution);

    let score = outcome_rx.recv().await.unwrap();
    let (stages, _) = score.result.unwrap();
    assert_eq!(stages[0].stage, Stage::Similarity);
    assert_eq!(stages[0].produced, 1);

    let recommend = outcome_rx.recv().await.unwrap();
    let (_, recommendations) = recommend.result.unwrap();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].target_individual_id, 1);
    assert_eq!(recommendations[0].activity_id, "Webinar");

    handle.await.unwrap();
    assert!(outcome_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_failed_job_is_reported_and_worker_continues() {
    let store = Arc::new(EdgeStore::default());
    let runner = Arc::new(BatchRunner::from_config(
        Arc::new(small_source()),
        store,
        &AppConfig::default(),
    ));

    let (queue, receiver) = ChannelJobQueue::bounded(4);
    let (outcome_tx, mut outcome_rx) = mpsc::channel(4);
    let handle = tokio::spawn(Worker::new(receiver, runner).with_outcomes(outcome_tx).run());

    let bad = RecommendationRequest {
        max_results: Some(0),
        ..Default::default()
    };
    queue
        .enqueue(Job::RunBatch { request: bad })
        .await
        .unwrap();
    queue
        .enqueue(Job::RunBatch {
            request: RecommendationRequest::default(),
        })
        .await
        .unwrap();
    drop(queue);

    assert!(outcome_rx.recv().await.unwrap().result.is_err());
    let (stages, recommendations) = outcome_rx.recv().await.unwrap().result.unwrap();
    assert_eq!(stages.len(), 4);
    assert_eq!(recommendations.len(), 1);

    handle.await.unwrap();
}

#[tokio::test]
async fn test_enqueue_fails_after_worker_is_gone() {
    let (queue, receiver) = ChannelJobQueue::bounded(1);
    drop(receiver);
    assert!(queue.enqueue(Job::Attribute).await.is_err());
}
