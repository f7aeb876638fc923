//! Pipeline orchestrator - runs the enabled stages of one request

use crate::{
    core::{is_safe_branch_name, AppConfig, RepositoryIdentity, RunRequest, RunState, Severity, Stage},
    execution::{EventSink, WorkspaceLocks},
    repo::{RepoError, RepositoryOps},
};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Outcome of a single stage
enum StageOutcome {
    Done,
    Warned,
    Fatal,
    Cancelled,
}

/// Sequences fetch → build → publish → deploy for a run request
///
/// Fetch and build failures end the run with an `error` event. Publish and
/// deploy failures are demoted to `warning` events and the run goes on.
pub struct PipelineOrchestrator<R> {
    repo: Arc<R>,
    config: Arc<AppConfig>,
    locks: WorkspaceLocks,
}

impl<R> Clone for PipelineOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<R: RepositoryOps + 'static> PipelineOrchestrator<R> {
    pub fn new(repo: R, config: Arc<AppConfig>) -> Self {
        Self {
            repo: Arc::new(repo),
            config,
            locks: WorkspaceLocks::new(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Locks shared by every run and metadata read of this orchestrator
    pub fn locks(&self) -> &WorkspaceLocks {
        &self.locks
    }

    /// Start a run on its own task
    pub fn spawn(
        &self,
        request: RunRequest,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> JoinHandle<RunState> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.execute(&request, sink, cancel).await })
    }

    /// Execute a run to completion, fatal failure or cancellation
    pub async fn execute(
        &self,
        request: &RunRequest,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> RunState {
        let stages = request.enabled_stages();
        let mut state = RunState::new(stages.len());
        let span = info_span!(
            "run",
            run_id = %state.run_id,
            repo = %request.git_config,
            branch = %request.branch
        );

        async {
            info!("Starting run with stages {:?}", stages);
            state.start();

            let Some(identity) = self.config.identity(&request.git_config) else {
                error!("Unknown repository configuration");
                sink.log(
                    &format!("Unknown repository configuration: {}", request.git_config),
                    Severity::Error,
                );
                state.fail();
                return;
            };

            if !is_safe_branch_name(&request.branch) {
                error!("Rejected branch name");
                sink.log(&format!("Invalid branch name: {}", request.branch), Severity::Error);
                state.fail();
                return;
            }

            let tree = self
                .config
                .workspace
                .run_tree(&request.git_config, &request.branch);

            // Held for the whole run.
            let _guard = if stages.is_empty() {
                None
            } else {
                if self.locks.is_locked(&tree) {
                    info!(tree = %tree.display(), "Waiting for another run on this tree");
                }
                tokio::select! {
                    guard = self.locks.acquire(&tree) => Some(guard),
                    _ = cancel.cancelled() => {
                        Self::cancelled(&mut state, sink.as_ref());
                        return;
                    }
                }
            };

            for stage in stages {
                if cancel.is_cancelled() {
                    Self::cancelled(&mut state, sink.as_ref());
                    return;
                }

                match self
                    .run_stage(stage, identity, &request.branch, &tree, &sink, &cancel)
                    .await
                {
                    StageOutcome::Done | StageOutcome::Warned => {
                        let progress = state.complete_stage(stage);
                        sink.progress(progress);
                    }
                    StageOutcome::Fatal => {
                        state.fail();
                        return;
                    }
                    StageOutcome::Cancelled => {
                        Self::cancelled(&mut state, sink.as_ref());
                        return;
                    }
                }
            }

            sink.log("Build completed successfully", Severity::Success);
            state.complete();
            info!("Run completed");
        }
        .instrument(span)
        .await;

        state
    }

    async fn run_stage(
        &self,
        stage: Stage,
        identity: &RepositoryIdentity,
        branch: &str,
        tree: &Path,
        sink: &Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> StageOutcome {
        info!(%stage, "Stage started");
        sink.log(&start_message(stage, branch), Severity::Info);

        let scripts = &self.config.scripts;
        let result = match stage {
            Stage::Fetch => self.repo.materialize(identity, branch, tree, cancel).await,
            Stage::Build => self.script(identity, tree, &scripts.build, sink, cancel).await,
            Stage::Publish => self.script(identity, tree, &scripts.publish, sink, cancel).await,
            Stage::Deploy => self.script(identity, tree, &scripts.deploy, sink, cancel).await,
        };

        match result {
            Ok(()) => {
                info!(%stage, "Stage finished");
                sink.log(&done_message(stage, branch), Severity::Success);
                StageOutcome::Done
            }
            Err(e) if e.is_cancelled() => StageOutcome::Cancelled,
            Err(e) if stage.is_fatal() => {
                error!(%stage, "Stage failed: {}", e);
                sink.log(&format!("{} failed: {}", capitalize(stage.label()), e), Severity::Error);
                StageOutcome::Fatal
            }
            Err(e) => {
                warn!(%stage, "Stage failed, continuing: {}", e);
                sink.log(
                    &format!("{} step skipped: {}", capitalize(stage.label()), e),
                    Severity::Warning,
                );
                StageOutcome::Warned
            }
        }
    }

    async fn script(
        &self,
        identity: &RepositoryIdentity,
        tree: &Path,
        script: &str,
        sink: &Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<(), RepoError> {
        self.repo
            .run_script(identity, tree, script, sink.clone(), cancel)
            .await
    }

    fn cancelled(state: &mut RunState, sink: &dyn EventSink) {
        warn!("Run cancelled");
        sink.log("Run cancelled", Severity::Error);
        state.cancel();
    }
}

fn start_message(stage: Stage, branch: &str) -> String {
    match stage {
        Stage::Fetch => format!("Fetching branch {}...", branch),
        Stage::Build => "Running build script...".to_string(),
        Stage::Publish => "Publishing artifacts...".to_string(),
        Stage::Deploy => "Deploying...".to_string(),
    }
}

fn done_message(stage: Stage, branch: &str) -> String {
    match stage {
        Stage::Fetch => format!("Branch {} fetched", branch),
        Stage::Build => "Build script finished".to_string(),
        Stage::Publish => "Publish step finished".to_string(),
        Stage::Deploy => "Deploy step finished".to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
