//! CLI command definitions

use crate::core::{RunRequest, Stage};
use clap::Args;

/// Default configuration file
pub const DEFAULT_CONFIG: &str = "config.json";

/// Start the server
#[derive(Debug, Args, Clone)]
pub struct ServeCommand {
    /// Path to the configuration file (JSON or YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Port to listen on, overrides the configuration and `PORT`
    #[arg(short, long)]
    pub port: Option<String>,
}

/// List branches of a repository
#[derive(Debug, Args, Clone)]
pub struct BranchesCommand {
    /// Name of the repository configuration
    pub git_config: String,

    /// Path to the configuration file (JSON or YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run a pipeline locally
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Name of the repository configuration
    #[arg(short, long)]
    pub git_config: String,

    /// Branch to build
    #[arg(short, long)]
    pub branch: String,

    /// Clone or update the working tree
    #[arg(long)]
    pub fetch: bool,

    /// Run the build script
    #[arg(long)]
    pub build: bool,

    /// Run the publish script
    #[arg(long)]
    pub publish: bool,

    /// Run the deploy script
    #[arg(long)]
    pub deploy: bool,

    /// Path to the configuration file (JSON or YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: String,
}

impl RunCommand {
    pub fn to_request(&self) -> RunRequest {
        let flags = [
            (Stage::Fetch, self.fetch),
            (Stage::Build, self.build),
            (Stage::Publish, self.publish),
            (Stage::Deploy, self.deploy),
        ];

        flags
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .fold(RunRequest::new(&self.git_config, &self.branch), |request, (stage, _)| {
                request.with_stage(stage)
            })
    }
}
