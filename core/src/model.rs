use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identity shared by individuals, activities and leads.
pub type NodeId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Individual {
    pub id: NodeId,
    pub first_name: String,
    pub last_name: String,
}

impl Individual {
    pub fn new(id: NodeId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// A marketing activity instance. Several activities may share one
/// `activity_id` (the campaign type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: NodeId,
    pub activity_id: String,
}

impl Activity {
    pub fn new(id: NodeId, activity_id: impl Into<String>) -> Self {
        Self {
            id,
            activity_id: activity_id.into(),
        }
    }
}

/// Created when an individual converts; `individual` is the `convertedTo` side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: NodeId,
    pub individual: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Touch {
    pub activity: NodeId,
    pub individual: NodeId,
    pub timestamp: i64,
}

impl Touch {
    pub fn new(activity: NodeId, individual: NodeId, timestamp: i64) -> Self {
        Self {
            activity,
            individual,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributionModel {
    LastTouch,
    FirstTouch,
    LinearTouch,
    ExpDecay,
}

impl AttributionModel {
    pub const ALL: [AttributionModel; 4] = [
        AttributionModel::LastTouch,
        AttributionModel::FirstTouch,
        AttributionModel::LinearTouch,
        AttributionModel::ExpDecay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastTouch => "lastTouch",
            Self::FirstTouch => "firstTouch",
            Self::LinearTouch => "linearTouch",
            Self::ExpDecay => "expDecay",
        }
    }
}

impl fmt::Display for AttributionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityMeasure {
    #[default]
    Cosine,
    Jaccard,
    Dice,
    Euclidean,
    Manhattan,
    SokalMichener,
    Faith,
    Ample,
}

impl SimilarityMeasure {
    pub const ALL: [SimilarityMeasure; 8] = [
        SimilarityMeasure::Cosine,
        SimilarityMeasure::Jaccard,
        SimilarityMeasure::Dice,
        SimilarityMeasure::Euclidean,
        SimilarityMeasure::Manhattan,
        SimilarityMeasure::SokalMichener,
        SimilarityMeasure::Faith,
        SimilarityMeasure::Ample,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Jaccard => "jaccard",
            Self::Dice => "dice",
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::SokalMichener => "sokal-michener",
            Self::Faith => "faith",
            Self::Ample => "ample",
        }
    }
}

impl fmt::Display for SimilarityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributionKey {
    pub lead: NodeId,
    pub activity: NodeId,
    pub model: AttributionModel,
    pub touch_sequence_position: usize,
}

/// Credit assigned by one attribution model to one touch of a converted
/// individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionEdge {
    pub lead: NodeId,
    pub individual: NodeId,
    pub activity: NodeId,
    pub attribution_model: AttributionModel,
    pub touch_time: i64,
    /// 1 = earliest touch.
    pub touch_sequence_position: usize,
    /// 1 = most recent touch.
    pub time_sequence_position: usize,
    pub weight: f64,
    pub total_touches: usize,
}

impl AttributionEdge {
    pub fn key(&self) -> AttributionKey {
        AttributionKey {
            lead: self.lead,
            activity: self.activity,
            model: self.attribution_model,
            touch_sequence_position: self.touch_sequence_position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimilarityKey {
    pub low: NodeId,
    pub high: NodeId,
    pub measure: SimilarityMeasure,
}

/// Undirected similarity between two individuals. `low < high` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub low: NodeId,
    pub high: NodeId,
    pub similarity: f64,
    pub measure: SimilarityMeasure,
}

impl SimilarityEdge {
    /// Builds an edge for an unordered pair. Returns `None` for self-pairs.
    pub fn between(
        first: NodeId,
        second: NodeId,
        similarity: f64,
        measure: SimilarityMeasure,
    ) -> Option<Self> {
        if first == second {
            return None;
        }
        Some(Self {
            low: first.min(second),
            high: first.max(second),
            similarity,
            measure,
        })
    }

    pub fn key(&self) -> SimilarityKey {
        SimilarityKey {
            low: self.low,
            high: self.high,
            measure: self.measure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub target_individual_id: NodeId,
    pub first_name: String,
    pub last_name: String,
    pub activity_id: String,
    pub avg_similarity: f64,
    pub neighbor_count: usize,
    pub measure: SimilarityMeasure,
}
