pub mod queue;
pub mod report;
pub mod runner;
pub mod worker;

pub use queue::{ChannelJobQueue, Job, JobQueue};
pub use report::{RunReport, Stage, StageReport};
pub use runner::{BatchRunner, PipelineError};
pub use worker::{JobOutcome, Worker};
