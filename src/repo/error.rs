//! Repository operation errors

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Error types for repository and script operations
///
/// Messages are human-readable and carry any captured subprocess output, with
/// credentials stripped from URLs.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("failed to fetch remote branches: {0}")]
    ListRemote(String),

    #[error("failed to clone branch {branch}: {output}")]
    Clone { branch: String, output: String },

    #[error("failed to pull latest changes for branch {branch}: {output}")]
    Pull { branch: String, output: String },

    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("script {script} exited with {status}")]
    ScriptFailed { script: String, status: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl RepoError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RepoError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RepoError::Cancelled)
    }
}

/// Replace the userinfo part of any URL in `text` with `***`
pub fn redact_credentials(text: &str) -> String {
    static USERINFO: OnceLock<Regex> = OnceLock::new();
    let re = USERINFO.get_or_init(|| {
        Regex::new(r"(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*://)[^/@\s]+@").expect("valid regex")
    });
    re.replace_all(text, "${scheme}***@").into_owned()
}
