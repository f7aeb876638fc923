//! Run requests and pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Build,
    Publish,
    Deploy,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::Build, Stage::Publish, Stage::Deploy];

    /// Whether a failure of this stage terminates the run
    pub fn is_fatal(self) -> bool {
        matches!(self, Stage::Fetch | Stage::Build)
    }

    /// Human-readable label used in log events
    pub fn label(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch repository",
            Stage::Build => "build",
            Stage::Publish => "publish",
            Stage::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Build => "build",
            Stage::Publish => "publish",
            Stage::Deploy => "deploy",
        })
    }
}

/// A request to run the pipeline against one branch
///
/// Field names follow the client's wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Name of the repository identity
    pub git_config: String,

    pub branch: String,

    #[serde(default)]
    pub pull_repos: bool,

    #[serde(default)]
    pub build_images: bool,

    #[serde(default)]
    pub push_harbor: bool,

    #[serde(default)]
    pub deploy: bool,
}

impl RunRequest {
    pub fn new(git_config: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            git_config: git_config.into(),
            branch: branch.into(),
            ..Self::default()
        }
    }

    /// Enable a stage
    pub fn with_stage(mut self, stage: Stage) -> Self {
        match stage {
            Stage::Fetch => self.pull_repos = true,
            Stage::Build => self.build_images = true,
            Stage::Publish => self.push_harbor = true,
            Stage::Deploy => self.deploy = true,
        }
        self
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => self.pull_repos,
            Stage::Build => self.build_images,
            Stage::Publish => self.push_harbor,
            Stage::Deploy => self.deploy,
        }
    }

    /// Enabled stages in execution order
    pub fn enabled_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| self.is_enabled(*stage))
            .collect()
    }
}
