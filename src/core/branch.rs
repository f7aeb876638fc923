//! Branch records derived from a remote listing

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Prefixes that mark a release branch
const RELEASE_PREFIXES: [&str; 3] = ["release/", "rel/", "v"];

/// Length of the abbreviated commit hash
const SHORT_HASH_LEN: usize = 8;

/// A branch as reported by the remote
///
/// Computed fresh on every listing; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,

    /// Discovery date (`YYYY-MM-DD`)
    pub date: String,

    pub description: String,

    /// First eight characters of the head commit
    pub commit_hash: String,

    pub is_release: bool,
}

impl Branch {
    /// Build a branch record from a name and its full commit hash
    pub fn new(name: &str, commit_hash: &str) -> Self {
        let is_release = is_release_branch(name);
        let description = if is_release {
            format!("Release branch {}", name)
        } else {
            format!("Development branch {}", name)
        };

        Self {
            name: name.to_string(),
            date: Local::now().format("%Y-%m-%d").to_string(),
            description,
            commit_hash: short_hash(commit_hash).to_string(),
            is_release,
        }
    }
}

/// Naming-convention check for release branches.
///
/// `release/*`, `rel/*`, `v*`, or exactly four ASCII digits (`0901`).
/// Four-letter names that are not all digits never match; unrelated numeric
/// names like `1234` do.
pub fn is_release_branch(name: &str) -> bool {
    if RELEASE_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return true;
    }

    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `name` can be used as a path below the workspace and as a git
/// argument: no empty, `.` or `..` components, no leading `/` or `-`
pub fn is_safe_branch_name(name: &str) -> bool {
    !name.starts_with('-')
        && !name.starts_with('/')
        && name
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}
