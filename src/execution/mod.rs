//! Pipeline execution

pub mod orchestrator;
pub mod sink;
pub mod workspace;

pub use orchestrator::PipelineOrchestrator;
pub use sink::{ChannelSink, EventSink, NoopSink};
pub use workspace::WorkspaceLocks;
