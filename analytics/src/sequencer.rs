use serde::{Deserialize, Serialize};
use storage::TouchGraph;
use touchgraph_core::model::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedTouch {
    pub activity: NodeId,
    pub timestamp: i64,
}

/// Touches of one individual in chronological order, earliest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchSequence {
    pub individual: NodeId,
    touches: Vec<SequencedTouch>,
}

impl TouchSequence {
    /// Orders by timestamp, then by activity node id so equal timestamps land
    /// in the same order on every run.
    pub fn new(individual: NodeId, mut touches: Vec<SequencedTouch>) -> Self {
        touches.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.activity.cmp(&b.activity))
        });
        Self {
            individual,
            touches,
        }
    }

    pub fn len(&self) -> usize {
        self.touches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touches.is_empty()
    }

    pub fn touches(&self) -> &[SequencedTouch] {
        &self.touches
    }

    pub fn first(&self) -> Option<&SequencedTouch> {
        self.touches.first()
    }

    pub fn last(&self) -> Option<&SequencedTouch> {
        self.touches.last()
    }
}

pub fn sequence_touches(graph: &TouchGraph, individual: NodeId) -> TouchSequence {
    let touches = graph
        .touches_of(individual)
        .iter()
        .map(|(activity, timestamp)| SequencedTouch {
            activity: *activity,
            timestamp: *timestamp,
        })
        .collect();
    TouchSequence::new(individual, touches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(activity: NodeId, timestamp: i64) -> SequencedTouch {
        SequencedTouch {
            activity,
            timestamp,
        }
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let seq = TouchSequence::new(1, vec![touch(3, 30), touch(1, 10), touch(2, 20)]);
        let order: Vec<NodeId> = seq.touches().iter().map(|t| t.activity).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(seq.first().unwrap().timestamp, 10);
        assert_eq!(seq.last().unwrap().timestamp, 30);
    }

    #[test]
    fn test_ties_break_on_activity_id() {
        let a = TouchSequence::new(1, vec![touch(9, 5), touch(4, 5), touch(7, 1)]);
        let b = TouchSequence::new(1, vec![touch(4, 5), touch(7, 1), touch(9, 5)]);
        assert_eq!(a, b);
        let order: Vec<NodeId> = a.touches().iter().map(|t| t.activity).collect();
        assert_eq!(order, vec![7, 4, 9]);
    }
}
