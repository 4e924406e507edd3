use storage::{InMemorySource, TouchGraph};
use touchgraph_core::model::{Activity, Individual, Lead, Touch};

/// Shape of a benchmark graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphShape {
    pub individuals: u64,
    pub activities: u64,
    pub touches_per_individual: u64,
    /// Every n-th individual converts.
    pub conversion_stride: u64,
}

impl GraphShape {
    /// Roughly the size the marketing demo ran with.
    pub const DEMO: GraphShape = GraphShape {
        individuals: 200,
        activities: 25,
        touches_per_individual: 6,
        conversion_stride: 2,
    };
}

/// Deterministic graph for benchmarks; a fixed LCG picks touch targets so
/// every run measures the same input.
pub fn bench_graph(shape: GraphShape) -> TouchGraph {
    let mut graph = TouchGraph::new();
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        state >> 33
    };

    for id in 0..shape.activities {
        let activity = Activity::new(10_000 + id, format!("campaign-{}", id % 7));
        // ids are unique by construction
        let _ = graph.add_activity(activity);
    }
    for id in 1..=shape.individuals {
        let _ = graph.add_individual(Individual::new(id, "Bench", format!("{id}")));
        for _ in 0..shape.touches_per_individual {
            let activity = 10_000 + next() % shape.activities.max(1);
            let timestamp = (next() % 1_000_000) as i64;
            let _ = graph.add_touch(Touch::new(activity, id, timestamp));
        }
        if shape.conversion_stride > 0 && id % shape.conversion_stride == 0 {
            let _ = graph.convert(Lead {
                id: 1_000_000 + id,
                individual: id,
            });
        }
    }
    graph
}

/// Flattens a benchmark graph back into source records.
pub fn bench_source(shape: GraphShape) -> InMemorySource {
    let graph = bench_graph(shape);
    let individuals: Vec<Individual> = graph
        .individual_ids()
        .filter_map(|id| graph.individual(id).cloned())
        .collect();
    let activities: Vec<Activity> = graph
        .activity_ids()
        .filter_map(|id| graph.activity(id).cloned())
        .collect();
    let touches: Vec<Touch> = individuals
        .iter()
        .flat_map(|individual| {
            graph
                .touches_of(individual.id)
                .iter()
                .map(move |(activity, ts)| Touch::new(*activity, individual.id, *ts))
        })
        .collect();
    let conversions: Vec<Lead> = graph.conversions().copied().collect();
    InMemorySource::from_parts(individuals, activities, touches, conversions)
}
