//! Git-backed repository client

use crate::core::{Branch, RepositoryIdentity};
use crate::execution::EventSink;
use crate::repo::script::{self, ScriptInvocation};
use crate::repo::{redact_credentials, RepoError, RepositoryOps};
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const HEADS_PREFIX: &str = "refs/heads/";

/// Build the URL used to talk to the remote.
///
/// With a token and an `https://` URL, the token becomes the userinfo
/// (`https://<token>@host/...`). Any other scheme is returned unchanged,
/// token or not.
pub fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (token, url.strip_prefix("https://")) {
        (Some(token), Some(rest)) if !token.is_empty() => format!("https://{}@{}", token, rest),
        _ => url.to_string(),
    }
}

/// Parse `git ls-remote --heads` output into branch records.
///
/// Lines that are not exactly `<hash> <ref>` or whose ref is not under
/// `refs/heads/` are skipped. Remote order is preserved.
pub fn parse_ls_remote(output: &str) -> Vec<Branch> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let (hash, reference) = match (parts.next(), parts.next(), parts.next()) {
                (Some(hash), Some(reference), None) => (hash, reference),
                _ => {
                    if !line.trim().is_empty() {
                        debug!("Skipping malformed ls-remote line: {}", line);
                    }
                    return None;
                }
            };

            let name = reference.strip_prefix(HEADS_PREFIX)?;
            if name.is_empty() {
                return None;
            }
            Some(Branch::new(name, hash))
        })
        .collect()
}

/// Repository client that shells out to `git` and runs scripts with an
/// interpreter
#[derive(Debug, Clone)]
pub struct GitClient {
    git_program: String,
    interpreter: String,
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl GitClient {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            git_program: "git".to_string(),
            interpreter: interpreter.into(),
        }
    }

    /// Run git, killing it if `cancel` fires first
    async fn git(&self, args: &[&str], cancel: &CancellationToken) -> Result<Output, RepoError> {
        let mut cmd = Command::new(&self.git_program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tokio::select! {
            output = cmd.output() => output.map_err(|source| RepoError::Spawn {
                program: self.git_program.clone(),
                source,
            }),
            _ = cancel.cancelled() => Err(RepoError::Cancelled),
        }
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    redact_credentials(text.trim())
}

#[async_trait]
impl RepositoryOps for GitClient {
    async fn list_branches(&self, identity: &RepositoryIdentity) -> Result<Vec<Branch>, RepoError> {
        info!("Fetching branches from repository: {}", identity.url);

        let url = authenticated_url(&identity.url, identity.token());
        let output = self
            .git(&["ls-remote", "--heads", &url], &CancellationToken::new())
            .await?;

        if !output.status.success() {
            return Err(RepoError::ListRemote(format!(
                "git ls-remote exited with {}: {}",
                output.status,
                combined_output(&output)
            )));
        }

        let branches = parse_ls_remote(&String::from_utf8_lossy(&output.stdout));
        info!("Found {} branches", branches.len());
        Ok(branches)
    }

    async fn materialize(
        &self,
        identity: &RepositoryIdentity,
        branch: &str,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RepoError> {
        let target_str = target.to_string_lossy();

        if tokio::fs::try_exists(target)
            .await
            .map_err(|e| RepoError::io(format!("failed to inspect {}", target.display()), e))?
        {
            info!("Updating existing working tree: {}", target.display());
            let output = self
                .git(
                    &["-C", &target_str, "pull", "--ff-only", "origin", branch],
                    cancel,
                )
                .await?;
            if !output.status.success() {
                return Err(RepoError::Pull {
                    branch: branch.to_string(),
                    output: combined_output(&output),
                });
            }
        } else {
            info!("Cloning branch {} to {}", branch, target.display());
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RepoError::io("failed to create parent directory", e))?;
            }

            let url = authenticated_url(&identity.url, identity.token());
            let output = self
                .git(
                    &[
                        "clone",
                        "--depth",
                        "1",
                        "--single-branch",
                        "-b",
                        branch,
                        &url,
                        &target_str,
                    ],
                    cancel,
                )
                .await?;
            if !output.status.success() {
                return Err(RepoError::Clone {
                    branch: branch.to_string(),
                    output: combined_output(&output),
                });
            }
        }

        info!("Working tree for branch {} is up to date", branch);
        Ok(())
    }

    async fn run_script(
        &self,
        identity: &RepositoryIdentity,
        tree: &Path,
        script: &str,
        sink: Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<(), RepoError> {
        script::run_script(
            ScriptInvocation {
                interpreter: &self.interpreter,
                tree,
                script,
                token: identity.token(),
            },
            sink,
            cancel,
        )
        .await
    }
}
