//! Repository operations: branch discovery, working tree materialization and
//! script execution

pub mod error;
pub mod git;
pub mod script;

use crate::core::{Branch, RepositoryIdentity};
use crate::execution::EventSink;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use error::{redact_credentials, RepoError};
pub use git::{authenticated_url, parse_ls_remote, GitClient};
pub use script::{ScriptInvocation, TOKEN_ENV_VARS};

/// Trait for repository operations - allows for different implementations
///
/// Every operation takes the repository identity explicitly; implementations
/// hold no per-request state.
#[async_trait]
pub trait RepositoryOps: Send + Sync {
    /// Enumerate the remote's branches, in the order the remote reports them
    async fn list_branches(&self, identity: &RepositoryIdentity) -> Result<Vec<Branch>, RepoError>;

    /// Clone `branch` into `target`, or update it in place if `target`
    /// already exists
    async fn materialize(
        &self,
        identity: &RepositoryIdentity,
        branch: &str,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RepoError>;

    /// Run a script from a materialized tree, streaming its output to `sink`
    async fn run_script(
        &self,
        identity: &RepositoryIdentity,
        tree: &Path,
        script: &str,
        sink: Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<(), RepoError>;
}
