//! Application configuration loaded from JSON or YAML

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse YAML config {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// A named remote repository the pipelines can target
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    /// Remote URL of the repository
    pub url: String,

    /// Personal access token, empty when the remote is public
    #[serde(default)]
    pub token: String,

    /// Human-readable label
    #[serde(default)]
    pub description: String,
}

impl RepositoryIdentity {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The token, if one is configured
    pub fn token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryIdentity")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("description", &self.description)
            .finish()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: String,

    /// Write timeout in seconds, bounds a single websocket push
    pub write_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: "8080".to_string(),
            write_timeout: 15,
        }
    }
}

/// Where working trees and scratch files live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub repos_dir: PathBuf,
    pub build_temp_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            repos_dir: PathBuf::from("repos"),
            build_temp_dir: PathBuf::from("build-temp"),
        }
    }
}

impl WorkspaceConfig {
    /// Working tree used by pipeline runs
    pub fn run_tree(&self, identity_name: &str, branch: &str) -> PathBuf {
        self.repos_dir.join(identity_name).join(branch)
    }

    /// Working tree used by the read-only metadata endpoints
    pub fn metadata_tree(&self, identity_name: &str, branch: &str) -> PathBuf {
        self.repos_dir.join("temp").join(identity_name).join(branch)
    }

    /// Create the top-level directories
    pub fn create_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.repos_dir)?;
        std::fs::create_dir_all(&self.build_temp_dir)
    }
}

/// Conventional script locations inside a working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub build: String,
    pub publish: String,
    pub deploy: String,

    /// Program used to run the scripts
    pub interpreter: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            build: "scripts/build.sh".to_string(),
            publish: "scripts/push.sh".to_string(),
            deploy: "scripts/deploy.sh".to_string(),
            interpreter: "bash".to_string(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,

    /// Repository identities selectable by name
    pub git_configs: BTreeMap<String, RepositoryIdentity>,

    pub workspace: WorkspaceConfig,

    pub scripts: ScriptsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut git_configs = BTreeMap::new();
        git_configs.insert(
            "main".to_string(),
            RepositoryIdentity::new("https://github.com/your-org/build-scripts.git")
                .with_description("Main build scripts repository"),
        );

        Self {
            server: ServerConfig::default(),
            git_configs,
            workspace: WorkspaceConfig::default(),
            scripts: ScriptsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from a file, picking the format by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
            }
            _ => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing or broken, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut config = if path.exists() {
            match Self::from_file(path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{}, using defaults", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides(std::env::var("PORT").ok());
        config
    }

    /// Apply the `PORT` override
    pub fn apply_env_overrides(&mut self, port: Option<String>) {
        if let Some(port) = port.filter(|p| !p.is_empty()) {
            self.server.port = port;
        }
    }

    /// Look up a repository identity by name
    pub fn identity(&self, name: &str) -> Option<&RepositoryIdentity> {
        self.git_configs.get(name)
    }
}
