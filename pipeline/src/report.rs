use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use storage::CommitStats;
use touchgraph_core::model::Recommendation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Attribution,
    Similarity,
    Recommendation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Attribution => "attribution",
            Stage::Similarity => "similarity",
            Stage::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one stage produced and how long it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub elapsed_ms: u64,
    /// Edges (or recommendations) produced by the stage.
    pub produced: usize,
    /// Entities skipped as missing data or undefined similarity.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub recommendations: Vec<Recommendation>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    pub fn total_elapsed_ms(&self) -> u64 {
        self.stages.iter().map(|report| report.elapsed_ms).sum()
    }
}
