//! buildrelay - build pipeline runner with live status streaming

pub mod cli;
pub mod core;
pub mod execution;
pub mod repo;
pub mod server;

// Re-export commonly used types
pub use crate::core::{AppConfig, Branch, RepositoryIdentity, RunEvent, RunRequest, Severity, Stage};
pub use crate::core::{ExecutionStatus, RunState};
pub use crate::execution::{ChannelSink, EventSink, PipelineOrchestrator};
pub use crate::repo::{GitClient, RepoError, RepositoryOps};
pub use crate::server::{router, AppState};
