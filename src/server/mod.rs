//! HTTP and websocket surface

pub mod api;
pub mod error;
pub mod session;

use crate::{
    core::AppConfig,
    execution::PipelineOrchestrator,
    repo::{GitClient, RepositoryOps},
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tracing::info;

pub use error::{ApiError, ApiResult};
pub use session::{parse_client_message, ClientMessage};

/// Shared state of every handler
pub struct AppState<R> {
    pub orchestrator: PipelineOrchestrator<R>,
}

impl<R: RepositoryOps + 'static> AppState<R> {
    pub fn new(orchestrator: PipelineOrchestrator<R>) -> Self {
        Self { orchestrator }
    }
}

/// Build the router over any repository implementation
pub fn router<R>(state: Arc<AppState<R>>) -> Router
where
    R: RepositoryOps + 'static,
{
    Router::new()
        .route("/api/git-configs", get(api::list_git_configs::<R>))
        .route("/api/branches/:git_config", get(api::list_branches::<R>))
        .route("/api/config/:git_config/*branch", get(api::branch_config::<R>))
        .route("/api/versions/:git_config/*branch", get(api::branch_versions::<R>))
        .route(
            "/api/release-notes/:git_config/*branch",
            get(api::release_notes::<R>),
        )
        .route("/ws", get(session::ws_handler::<R>))
        .with_state(state)
}

/// Run the server until it fails
pub async fn serve(config: AppConfig) -> Result<()> {
    config
        .workspace
        .create_dirs()
        .context("Failed to create workspace directories")?;

    let addr = format!("0.0.0.0:{}", config.server.port);
    let repo = GitClient::new(config.scripts.interpreter.clone());
    let orchestrator = PipelineOrchestrator::new(repo, Arc::new(config));
    let app = router(Arc::new(AppState::new(orchestrator)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
