use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use touchgraph_core::error::{ErrorCode, TouchgraphError};
use touchgraph_core::model::{Activity, Individual, Lead, NodeId, Touch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate individual: {0}")]
    DuplicateIndividual(NodeId),
    #[error("duplicate activity: {0}")]
    DuplicateActivity(NodeId),
    #[error("unknown individual: {0}")]
    UnknownIndividual(NodeId),
    #[error("unknown activity: {0}")]
    UnknownActivity(NodeId),
    #[error("individual {individual} already converted to lead {lead}")]
    AlreadyConverted { individual: NodeId, lead: NodeId },
}

impl TouchgraphError for GraphError {
    fn error_code(&self) -> ErrorCode {
        match self {
            GraphError::UnknownIndividual(_) | GraphError::UnknownActivity(_) => {
                ErrorCode::NotFound
            }
            _ => ErrorCode::InvalidArgument,
        }
    }
}

/// Touch entry as seen from one individual: (activity node, timestamp).
pub type TouchData = (NodeId, i64);

/// Materialized snapshot of the touch/conversion graph.
///
/// Keeps both directions of the touch incidence: per individual the raw touch
/// list and the distinct set of activities, per activity the set of touched
/// individuals. All indexes are read-only once the snapshot is built.
#[derive(Debug, Clone, Default)]
pub struct TouchGraph {
    individuals: BTreeMap<NodeId, Individual>,
    activities: BTreeMap<NodeId, Activity>,
    leads: BTreeMap<NodeId, Lead>,
    touches: HashMap<NodeId, Vec<TouchData>>,
    activity_sets: HashMap<NodeId, BTreeSet<NodeId>>,
    reach: HashMap<NodeId, BTreeSet<NodeId>>,
    touch_count: usize,
}

impl TouchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_individual(&mut self, individual: Individual) -> Result<(), GraphError> {
        if self.individuals.contains_key(&individual.id) {
            return Err(GraphError::DuplicateIndividual(individual.id));
        }
        self.individuals.insert(individual.id, individual);
        Ok(())
    }

    pub fn add_activity(&mut self, activity: Activity) -> Result<(), GraphError> {
        if self.activities.contains_key(&activity.id) {
            return Err(GraphError::DuplicateActivity(activity.id));
        }
        self.activities.insert(activity.id, activity);
        Ok(())
    }

    pub fn add_touch(&mut self, touch: Touch) -> Result<(), GraphError> {
        if !self.individuals.contains_key(&touch.individual) {
            return Err(GraphError::UnknownIndividual(touch.individual));
        }
        if !self.activities.contains_key(&touch.activity) {
            return Err(GraphError::UnknownActivity(touch.activity));
        }

        self.touches
            .entry(touch.individual)
            .or_default()
            .push((touch.activity, touch.timestamp));
        self.activity_sets
            .entry(touch.individual)
            .or_default()
            .insert(touch.activity);
        self.reach
            .entry(touch.activity)
            .or_default()
            .insert(touch.individual);
        self.touch_count += 1;
        Ok(())
    }

    pub fn convert(&mut self, lead: Lead) -> Result<(), GraphError> {
        if !self.individuals.contains_key(&lead.individual) {
            return Err(GraphError::UnknownIndividual(lead.individual));
        }
        if let Some(existing) = self.leads.get(&lead.individual) {
            return Err(GraphError::AlreadyConverted {
                individual: lead.individual,
                lead: existing.id,
            });
        }
        self.leads.insert(lead.individual, lead);
        Ok(())
    }

    pub fn individual(&self, id: NodeId) -> Option<&Individual> {
        self.individuals.get(&id)
    }

    pub fn activity(&self, id: NodeId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    /// Individual ids in ascending order.
    pub fn individual_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.individuals.keys().copied()
    }

    /// Activity ids in ascending order.
    pub fn activity_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.activities.keys().copied()
    }

    /// Raw touches of one individual in insertion order.
    pub fn touches_of(&self, individual: NodeId) -> &[TouchData] {
        self.touches
            .get(&individual)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Distinct activity nodes that touched the individual.
    pub fn activity_set(&self, individual: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.activity_sets.get(&individual)
    }

    /// Individuals touched by one activity.
    pub fn touched_by(&self, activity: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.reach.get(&activity)
    }

    pub fn lead_of(&self, individual: NodeId) -> Option<&Lead> {
        self.leads.get(&individual)
    }

    pub fn is_converted(&self, individual: NodeId) -> bool {
        self.leads.contains_key(&individual)
    }

    /// Converted individuals with their leads, ordered by individual id.
    pub fn conversions(&self) -> impl Iterator<Item = &Lead> + '_ {
        self.leads.values()
    }

    pub fn unconverted_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.individuals
            .keys()
            .copied()
            .filter(|id| !self.leads.contains_key(id))
    }

    pub fn individual_count(&self) -> usize {
        self.individuals.len()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn touch_count(&self) -> usize {
        self.touch_count
    }

    pub fn conversion_count(&self) -> usize {
        self.leads.len()
    }
}
