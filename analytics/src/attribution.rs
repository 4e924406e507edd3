//! Multi-model touch attribution.
//!
//! Every model reads the same chronological [`TouchSequence`] and differs only
//! in which positions receive credit and how much:
//! - **lastTouch**: the most recent touch, weight 1.0
//! - **firstTouch**: the earliest touch, weight 1.0
//! - **linearTouch**: every touch, `1 / touches`
//! - **expDecay**: every touch, `exp(-rate * k)` with `k = 1` for the most
//!   recent touch; a single touch gets 1.0
//!
//! Only positions with a nonzero weight are credited: on very long histories
//! the oldest expDecay weights underflow to zero and are left out.

use crate::sequencer::{sequence_touches, TouchSequence};
use serde::{Deserialize, Serialize};
use storage::TouchGraph;
use thiserror::Error;
use touchgraph_core::config::AnalyticsConfig;
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{AttributionEdge, AttributionModel, Lead, NodeId};
use tracing::{debug, warn};

pub const DEFAULT_DECAY_RATE: f64 = 0.7;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributionIssue {
    #[error("individual {individual} converted to lead {lead} without any touches")]
    MissingData { individual: NodeId, lead: NodeId },
}

impl TouchgraphError for AttributionIssue {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::NotFound
    }
}

/// Credit for one position of the chronological sequence (0 = earliest).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Credit {
    pub index: usize,
    pub weight: f64,
}

/// Positions credited by `model` for a sequence of `touches` entries.
pub fn credit(model: AttributionModel, touches: usize, decay_rate: f64) -> Vec<Credit> {
    if touches == 0 {
        return Vec::new();
    }

    match model {
        AttributionModel::LastTouch => vec![Credit {
            index: touches - 1,
            weight: 1.0,
        }],
        AttributionModel::FirstTouch => vec![Credit {
            index: 0,
            weight: 1.0,
        }],
        AttributionModel::LinearTouch => {
            let weight = 1.0 / touches as f64;
            (0..touches).map(|index| Credit { index, weight }).collect()
        }
        AttributionModel::ExpDecay => {
            if touches == 1 {
                return vec![Credit {
                    index: 0,
                    weight: 1.0,
                }];
            }
            (0..touches)
                .map(|index| {
                    let from_most_recent = (touches - index) as f64;
                    Credit {
                        index,
                        weight: (-decay_rate * from_most_recent).exp(),
                    }
                })
                .filter(|credit| credit.weight.is_normal())
                .collect()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionOutcome {
    pub edges: Vec<AttributionEdge>,
    pub leads_attributed: usize,
    pub skipped: Vec<AttributionIssue>,
}

pub struct AttributionEngine {
    models: Vec<AttributionModel>,
    decay_rate: f64,
}

impl AttributionEngine {
    pub fn new(models: Vec<AttributionModel>, decay_rate: f64) -> Self {
        Self { models, decay_rate }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.models.clone(), config.decay_rate)
    }

    pub fn models(&self) -> &[AttributionModel] {
        &self.models
    }

    /// Edges for one converted individual across all configured models.
    pub fn attribute(
        &self,
        lead: &Lead,
        sequence: &TouchSequence,
    ) -> Result<Vec<AttributionEdge>, AttributionIssue> {
        if sequence.is_empty() {
            return Err(AttributionIssue::MissingData {
                individual: lead.individual,
                lead: lead.id,
            });
        }

        let total = sequence.len();
        let touches = sequence.touches();
        let mut edges = Vec::new();

        for model in &self.models {
            for Credit { index, weight } in credit(*model, total, self.decay_rate) {
                let touch = touches[index];
                edges.push(AttributionEdge {
                    lead: lead.id,
                    individual: lead.individual,
                    activity: touch.activity,
                    attribution_model: *model,
                    touch_time: touch.timestamp,
                    touch_sequence_position: index + 1,
                    time_sequence_position: total - index,
                    weight,
                    total_touches: total,
                });
            }
        }

        Ok(edges)
    }

    /// Attributes every converted individual in the snapshot. Individuals
    /// without touches are logged and skipped.
    pub fn run(&self, graph: &TouchGraph) -> AttributionOutcome {
        let mut outcome = AttributionOutcome::default();

        for lead in graph.conversions() {
            let sequence = sequence_touches(graph, lead.individual);
            match self.attribute(lead, &sequence) {
                Ok(edges) => {
                    outcome.leads_attributed += 1;
                    outcome.edges.extend(edges);
                }
                Err(issue) => {
                    warn!("Skipping attribution: {}", issue);
                    outcome.skipped.push(issue);
                }
            }
        }

        outcome.edges.sort_by_key(AttributionEdge::key);
        debug!(
            leads = outcome.leads_attributed,
            edges = outcome.edges.len(),
            skipped = outcome.skipped.len(),
            "Attribution finished"
        );
        outcome
    }
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new(AttributionModel::ALL.to_vec(), DEFAULT_DECAY_RATE)
    }
}
