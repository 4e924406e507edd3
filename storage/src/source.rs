use crate::graph::{GraphError, TouchGraph};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{Activity, Individual, Lead, Touch};
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed graph data: {0}")]
    Malformed(#[from] GraphError),
}

impl TouchgraphError for SourceError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SourceError::Unavailable(_) => ErrorCode::Unavailable,
            SourceError::Malformed(_) => ErrorCode::DataLoss,
        }
    }
}

/// Structural queries the batch needs from the external graph store.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn list_individuals(&self) -> Result<Vec<Individual>, SourceError>;
    async fn list_activities(&self) -> Result<Vec<Activity>, SourceError>;
    async fn list_touches(&self) -> Result<Vec<Touch>, SourceError>;
    async fn list_conversions(&self) -> Result<Vec<Lead>, SourceError>;
}

/// Pulls every collection from the source and validates it into a snapshot.
/// Any dangling reference fails the whole load.
pub async fn load_snapshot(source: &dyn GraphSource) -> Result<TouchGraph, SourceError> {
    let individuals = source.list_individuals().await?;
    let activities = source.list_activities().await?;
    let touches = source.list_touches().await?;
    let conversions = source.list_conversions().await?;

    let mut graph = TouchGraph::new();
    for individual in individuals {
        graph.add_individual(individual)?;
    }
    for activity in activities {
        graph.add_activity(activity)?;
    }
    for touch in touches {
        graph.add_touch(touch)?;
    }
    for lead in conversions {
        graph.convert(lead)?;
    }

    debug!(
        individuals = graph.individual_count(),
        activities = graph.activity_count(),
        touches = graph.touch_count(),
        conversions = graph.conversion_count(),
        "Loaded touch graph snapshot"
    );
    Ok(graph)
}

#[derive(Debug, Default, Clone)]
struct SourceData {
    individuals: Vec<Individual>,
    activities: Vec<Activity>,
    touches: Vec<Touch>,
    conversions: Vec<Lead>,
}

/// Source backed by in-process vectors. Records are returned as inserted; no
/// validation happens until `load_snapshot`.
#[derive(Debug, Default)]
pub struct InMemorySource {
    data: RwLock<SourceData>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        individuals: Vec<Individual>,
        activities: Vec<Activity>,
        touches: Vec<Touch>,
        conversions: Vec<Lead>,
    ) -> Self {
        Self {
            data: RwLock::new(SourceData {
                individuals,
                activities,
                touches,
                conversions,
            }),
        }
    }

    pub async fn push_individual(&self, individual: Individual) {
        self.data.write().await.individuals.push(individual);
    }

    pub async fn push_activity(&self, activity: Activity) {
        self.data.write().await.activities.push(activity);
    }

    pub async fn push_touch(&self, touch: Touch) {
        self.data.write().await.touches.push(touch);
    }

    pub async fn push_conversion(&self, lead: Lead) {
        self.data.write().await.conversions.push(lead);
    }
}

#[async_trait]
impl GraphSource for InMemorySource {
    async fn list_individuals(&self) -> Result<Vec<Individual>, SourceError> {
        Ok(self.data.read().await.individuals.clone())
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, SourceError> {
        Ok(self.data.read().await.activities.clone())
    }

    async fn list_touches(&self) -> Result<Vec<Touch>, SourceError> {
        Ok(self.data.read().await.touches.clone())
    }

    async fn list_conversions(&self) -> Result<Vec<Lead>, SourceError> {
        Ok(self.data.read().await.conversions.clone())
    }
}
