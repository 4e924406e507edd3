use crate::queue::Job;
use crate::report::StageReport;
use crate::runner::{BatchRunner, PipelineError};
use std::sync::Arc;
use tokio::sync::mpsc;
use touchgraph_core::model::Recommendation;
use tracing::{error, info};

/// Result of one processed job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub result: Result<(Vec<StageReport>, Vec<Recommendation>), PipelineError>,
}

/// Drains the job channel and runs each job against a fresh snapshot.
pub struct Worker {
    receiver: mpsc::Receiver<Job>,
    runner: Arc<BatchRunner>,
    outcomes: Option<mpsc::Sender<JobOutcome>>,
}

impl Worker {
    pub fn new(receiver: mpsc::Receiver<Job>, runner: Arc<BatchRunner>) -> Self {
        Self {
            receiver,
            runner,
            outcomes: None,
        }
    }

    /// Forwards every job outcome to `sender`.
    pub fn with_outcomes(mut self, sender: mpsc::Sender<JobOutcome>) -> Self {
        self.outcomes = Some(sender);
        self
    }

    pub async fn run(mut self) {
        info!("Worker started");
        while let Some(job) = self.receiver.recv().await {
            info!("Processing {:?}", job);
            let result = self.process(&job).await;
            if let Err(e) = &result {
                error!("Job {:?} failed: {}", job, e);
            }
            if let Some(outcomes) = &self.outcomes {
                if outcomes.send(JobOutcome { job, result }).await.is_err() {
                    error!("Outcome receiver dropped");
                }
            }
        }
        info!("Worker stopped");
    }

    async fn process(
        &self,
        job: &Job,
    ) -> Result<(Vec<StageReport>, Vec<Recommendation>), PipelineError> {
        match job {
            Job::RunBatch { request } => {
                let report = self.runner.run(request).await?;
                Ok((report.stages, report.recommendations))
            }
            Job::Attribute => {
                let graph = self.runner.load().await?;
                let report = self.runner.attribute(&graph).await?;
                Ok((vec![report], Vec::new()))
            }
            Job::ScoreSimilarity => {
                let graph = self.runner.load().await?;
                let report = self.runner.score(&graph).await?;
                Ok((vec![report], Vec::new()))
            }
            Job::Recommend { request } => {
                let graph = self.runner.load().await?;
                let (report, recommendations) = self.runner.recommend(&graph, request).await?;
                Ok((vec![report], recommendations))
            }
        }
    }
}
