//! Read-only metadata endpoints
//!
//! Branch files (`config.yaml`, `versions.json`, `release-notes.md`) are
//! passed through as opaque documents; nothing here interprets them.

use crate::{
    core::{is_safe_branch_name, Branch, RepositoryIdentity},
    repo::RepositoryOps,
    server::{ApiError, ApiResult, AppState},
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A configured repository as exposed to clients; the token stays private
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySummary {
    pub name: String,
    pub url: String,
    pub description: String,
}

/// Release notes of a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseNotes {
    pub branch: String,
    pub notes: String,
}

fn lookup_identity<'a, R>(state: &'a AppState<R>, name: &str) -> ApiResult<&'a RepositoryIdentity>
where
    R: RepositoryOps + 'static,
{
    state
        .orchestrator
        .config()
        .identity(name)
        .ok_or_else(|| ApiError::UnknownRepository(name.to_string()))
}

/// `GET /api/git-configs`
pub async fn list_git_configs<R>(State(state): State<Arc<AppState<R>>>) -> Json<Vec<RepositorySummary>>
where
    R: RepositoryOps + 'static,
{
    let summaries = state
        .orchestrator
        .config()
        .git_configs
        .iter()
        .map(|(name, identity)| RepositorySummary {
            name: name.clone(),
            url: identity.url.clone(),
            description: identity.description.clone(),
        })
        .collect();
    Json(summaries)
}

/// `GET /api/branches/:git_config`
pub async fn list_branches<R>(
    State(state): State<Arc<AppState<R>>>,
    Path(git_config): Path<String>,
) -> ApiResult<Json<Vec<Branch>>>
where
    R: RepositoryOps + 'static,
{
    let identity = lookup_identity(state.as_ref(), &git_config)?;
    let branches = state.orchestrator.repository().list_branches(identity).await?;
    Ok(Json(branches))
}

/// `GET /api/config/:git_config/*branch`
pub async fn branch_config<R>(
    State(state): State<Arc<AppState<R>>>,
    Path((git_config, branch)): Path<(String, String)>,
) -> ApiResult<Json<Value>>
where
    R: RepositoryOps + 'static,
{
    let branch = normalize_branch(&branch)?;
    let content = read_branch_file(state.as_ref(), &git_config, &branch, "config.yaml").await?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|e| ApiError::Internal(format!("failed to parse config.yaml: {}", e)))?;
    Ok(Json(value))
}

/// `GET /api/versions/:git_config/*branch`
pub async fn branch_versions<R>(
    State(state): State<Arc<AppState<R>>>,
    Path((git_config, branch)): Path<(String, String)>,
) -> ApiResult<Json<Value>>
where
    R: RepositoryOps + 'static,
{
    let branch = normalize_branch(&branch)?;
    let content = read_branch_file(state.as_ref(), &git_config, &branch, "versions.json").await?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| ApiError::Internal(format!("failed to parse versions.json: {}", e)))?;
    Ok(Json(value))
}

/// `GET /api/release-notes/:git_config/*branch`
pub async fn release_notes<R>(
    State(state): State<Arc<AppState<R>>>,
    Path((git_config, branch)): Path<(String, String)>,
) -> ApiResult<Json<ReleaseNotes>>
where
    R: RepositoryOps + 'static,
{
    let branch = normalize_branch(&branch)?;
    let notes = read_branch_file(state.as_ref(), &git_config, &branch, "release-notes.md").await?;
    Ok(Json(ReleaseNotes { branch, notes }))
}

/// Wildcard segments may arrive with a leading slash
fn normalize_branch(raw: &str) -> ApiResult<String> {
    let branch = raw.trim_start_matches('/');
    if is_safe_branch_name(branch) {
        Ok(branch.to_string())
    } else {
        Err(ApiError::BadRequest(format!("invalid branch name: {}", raw)))
    }
}

/// Materialize the branch's metadata tree and read one file from it
async fn read_branch_file<R>(
    state: &AppState<R>,
    git_config: &str,
    branch: &str,
    file: &str,
) -> ApiResult<String>
where
    R: RepositoryOps + 'static,
{
    let identity = lookup_identity(state, git_config)?;
    let orchestrator = &state.orchestrator;
    let tree = orchestrator
        .config()
        .workspace
        .metadata_tree(git_config, branch);

    let _guard = orchestrator.locks().acquire(&tree).await;
    orchestrator
        .repository()
        .materialize(identity, branch, &tree, &CancellationToken::new())
        .await?;

    let path = tree.join(file);
    debug!("Reading {}", path.display());
    tokio::fs::read_to_string(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound(format!("{} on branch {}", file, branch))
        } else {
            ApiError::Internal(format!("failed to read {}: {}", file, e))
        }
    })
}
