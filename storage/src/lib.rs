pub mod graph;
pub mod source;
pub mod store;

pub use graph::{GraphError, TouchGraph};
pub use source::{load_snapshot, GraphSource, InMemorySource, SourceError};
pub use store::{CommitStats, EdgeSink, EdgeStore, StoreError};
