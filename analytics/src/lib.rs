pub mod attribution;
pub mod recommend;
pub mod request;
pub mod sequencer;
pub mod similarity;

pub use attribution::{AttributionEngine, AttributionIssue, AttributionOutcome};
pub use recommend::{RecommendationRanker, RankerOutcome};
pub use request::{RecommendationRequest, RequestValidationError};
pub use sequencer::{sequence_touches, SequencedTouch, TouchSequence};
pub use similarity::{BinaryCounts, ScoreError, SimilarityOutcome, SimilarityScorer};
