//! Core domain models
//!
//! Repository identities and app configuration, branch records, run
//! requests, run events and per-run state.

pub mod branch;
pub mod config;
pub mod event;
pub mod request;
pub mod state;

pub use branch::*;
pub use config::{AppConfig, ConfigError, RepositoryIdentity};
pub use event::*;
pub use request::*;
pub use state::*;
