use crate::model::{AttributionModel, SimilarityMeasure};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

const DEFAULT_NEIGHBOR_LIMIT: usize = 10;
const DEFAULT_DECAY_RATE: f64 = 0.7;
const DEFAULT_QUEUE_CAPACITY: usize = 16;
const DEFAULT_METRICS_HISTORY: usize = 256;

/// How the recommendation ranker decides that a candidate activity already
/// reached the target individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Drop only the exact activity nodes that touched the target.
    #[default]
    NodeIdentity,
    /// Also drop activities sharing an `activity_id` with any of those nodes.
    ActivityId,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub models: Vec<AttributionModel>,
    pub decay_rate: f64,
    pub similarity_measure: SimilarityMeasure,
    pub neighbor_limit: usize,
    pub exclusion: ExclusionPolicy,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            models: AttributionModel::ALL.to_vec(),
            decay_rate: DEFAULT_DECAY_RATE,
            similarity_measure: SimilarityMeasure::Cosine,
            neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
            exclusion: ExclusionPolicy::NodeIdentity,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub metrics_history: usize,
    /// Remove stored edges of a recomputed model/measure that the new run no
    /// longer produces.
    pub prune_stale: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            metrics_history: DEFAULT_METRICS_HISTORY,
            prune_stale: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub analytics: AnalyticsConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Layers `config/default`, `config/{RUN_MODE}` and `TOUCHGRAPH__*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let default_path = dir.join("default");
        let mode_path = dir.join(&run_mode);

        let builder = Config::builder()
            .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
            .add_source(File::with_name(&mode_path.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("TOUCHGRAPH").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let analytics = &self.analytics;
        if analytics.models.is_empty() {
            return Err(invalid("analytics.models must not be empty"));
        }
        if !analytics.decay_rate.is_finite() || analytics.decay_rate <= 0.0 {
            return Err(invalid("analytics.decay_rate must be a positive number"));
        }
        if analytics.neighbor_limit == 0 {
            return Err(invalid("analytics.neighbor_limit must be at least 1"));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(invalid("pipeline.queue_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}
