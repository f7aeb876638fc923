//! Shared test utilities: a scriptable repository and a collecting sink

#![allow(dead_code)]

use async_trait::async_trait;
use buildrelay::core::{AppConfig, Branch, RepositoryIdentity, RunEvent, Severity};
use buildrelay::execution::EventSink;
use buildrelay::repo::{RepoError, RepositoryOps};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// How a mocked script behaves
#[derive(Debug, Clone)]
pub enum ScriptBehavior {
    /// Print the lines to stdout and exit 0
    Succeed(Vec<String>),
    /// Exit with the given status
    Fail(i32),
    /// The script does not exist in the tree
    Missing,
    /// Run until cancelled
    Hang,
}

/// Repository double with per-script behavior
pub struct MockRepo {
    pub branches: Vec<Branch>,
    pub fetch_error: Option<String>,
    pub scripts: HashMap<String, ScriptBehavior>,
    /// Files written into the tree by `materialize`
    pub files: HashMap<String, String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockRepo {
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            fetch_error: None,
            scripts: HashMap::new(),
            files: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_branches(mut self, branches: Vec<Branch>) -> Self {
        self.branches = branches;
        self
    }

    pub fn with_fetch_error(mut self, error: &str) -> Self {
        self.fetch_error = Some(error.to_string());
        self
    }

    pub fn with_script(mut self, script: &str, behavior: ScriptBehavior) -> Self {
        self.scripts.insert(script.to_string(), behavior);
        self
    }

    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.files.insert(name.to_string(), content.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RepositoryOps for MockRepo {
    async fn list_branches(&self, identity: &RepositoryIdentity) -> Result<Vec<Branch>, RepoError> {
        self.record(format!("list {}", identity.url));
        Ok(self.branches.clone())
    }

    async fn materialize(
        &self,
        _identity: &RepositoryIdentity,
        branch: &str,
        target: &Path,
        _cancel: &CancellationToken,
    ) -> Result<(), RepoError> {
        self.record(format!("materialize {}", branch));
        if let Some(error) = &self.fetch_error {
            return Err(RepoError::Clone {
                branch: branch.to_string(),
                output: error.clone(),
            });
        }

        if !self.files.is_empty() {
            std::fs::create_dir_all(target).unwrap();
            for (name, content) in &self.files {
                std::fs::write(target.join(name), content).unwrap();
            }
        }
        Ok(())
    }

    async fn run_script(
        &self,
        _identity: &RepositoryIdentity,
        _tree: &Path,
        script: &str,
        sink: Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<(), RepoError> {
        self.record(format!("script {}", script));
        match self.scripts.get(script) {
            Some(ScriptBehavior::Succeed(lines)) => {
                for line in lines {
                    sink.log(line, Severity::Info);
                }
                Ok(())
            }
            Some(ScriptBehavior::Fail(code)) => Err(RepoError::ScriptFailed {
                script: script.to_string(),
                status: format!("exit status: {}", code),
            }),
            Some(ScriptBehavior::Hang) => {
                cancel.cancelled().await;
                self.record(format!("cancelled {}", script));
                Err(RepoError::Cancelled)
            }
            Some(ScriptBehavior::Missing) | None => {
                Err(RepoError::ScriptNotFound(script.to_string()))
            }
        }
    }
}

/// Sink that keeps every event
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events()
            .iter()
            .filter(|e| e.severity() == Some(severity))
            .count()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.events().iter().filter_map(RunEvent::percent).collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Compact rendering of an event for order assertions
pub fn describe(event: &RunEvent) -> String {
    match event {
        RunEvent::Log(entry) => format!("{}: {}", entry.severity, entry.message),
        RunEvent::Progress(update) => format!("progress: {}", update.progress),
    }
}

/// Configuration with a `main` identity and a workspace below `root`
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.workspace.repos_dir = root.join("repos");
    config.workspace.build_temp_dir = root.join("build-temp");
    config
        .git_configs
        .insert("main".to_string(), RepositoryIdentity::new("https://example.com/r.git"));
    config
}

/// Temporary workspace root, removed when dropped
pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Wait for a condition, polling
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
