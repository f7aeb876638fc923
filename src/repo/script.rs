//! Script execution with live output forwarding

use crate::core::Severity;
use crate::execution::EventSink;
use crate::repo::RepoError;
use futures::StreamExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Variables that receive the repository token, for scripts written against
/// either convention
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITLAB_TOKEN", "GIT_TOKEN"];

/// Lines longer than this are dropped and replaced by a notice
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// How long output is still read after the script exits. Background jobs
/// that inherited the pipes can keep them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A script to run inside a working tree
#[derive(Debug, Clone, Copy)]
pub struct ScriptInvocation<'a> {
    /// Program that runs the script (e.g. `bash`)
    pub interpreter: &'a str,

    /// Root of the working tree, used as the working directory
    pub tree: &'a Path,

    /// Script path relative to the tree
    pub script: &'a str,

    /// Token exported under [`TOKEN_ENV_VARS`]
    pub token: Option<&'a str>,
}

/// Run a script, streaming stdout lines as `info` and stderr lines as
/// `error` events while it runs.
///
/// Returns once the process has exited and its pipes are drained, or
/// [`DRAIN_GRACE`] after exit if something else still holds them. A
/// non-zero exit is [`RepoError::ScriptFailed`]. A fired `cancel` kills the
/// script's whole process group and returns [`RepoError::Cancelled`].
pub async fn run_script(
    invocation: ScriptInvocation<'_>,
    sink: Arc<dyn EventSink>,
    cancel: &CancellationToken,
) -> Result<(), RepoError> {
    let script_path = invocation.tree.join(invocation.script);

    match tokio::fs::metadata(&script_path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(RepoError::ScriptNotFound(invocation.script.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RepoError::ScriptNotFound(invocation.script.to_string()));
        }
        Err(e) => return Err(RepoError::io(format!("failed to stat {}", invocation.script), e)),
    }

    make_executable(&script_path).await?;

    // The working directory changes, so hand the interpreter an absolute path.
    let script_path = tokio::fs::canonicalize(&script_path)
        .await
        .map_err(|e| RepoError::io(format!("failed to resolve {}", invocation.script), e))?;

    info!(script = invocation.script, tree = %invocation.tree.display(), "Running script");

    let mut cmd = Command::new(invocation.interpreter);
    cmd.arg(&script_path)
        .current_dir(invocation.tree)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so cancellation reaches the script's children too
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(token) = invocation.token {
        for var in TOKEN_ENV_VARS {
            cmd.env(var, token);
        }
    }

    let mut child = cmd.spawn().map_err(|source| RepoError::Spawn {
        program: invocation.interpreter.to_string(),
        source,
    })?;
    let group = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RepoError::io("stdout pipe", std::io::Error::other("not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RepoError::io("stderr pipe", std::io::Error::other("not captured")))?;

    let mut stdout_task = tokio::spawn(forward_lines(stdout, sink.clone(), Severity::Info));
    let mut stderr_task = tokio::spawn(forward_lines(stderr, sink, Severity::Error));

    let status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            warn!(script = invocation.script, "Cancelled, killing script");
            kill_group(group);
            if let Err(e) = child.kill().await {
                debug!("Script process already gone: {}", e);
            }
            stdout_task.abort();
            stderr_task.abort();
            return Err(RepoError::Cancelled);
        }
    };

    // Every line must be forwarded before the caller emits its next event.
    let drained = tokio::select! {
        joined = tokio::time::timeout(
            DRAIN_GRACE,
            futures::future::join(&mut stdout_task, &mut stderr_task),
        ) => joined.ok(),
        _ = cancel.cancelled() => {
            warn!(script = invocation.script, "Cancelled while draining output");
            kill_group(group);
            stdout_task.abort();
            stderr_task.abort();
            return Err(RepoError::Cancelled);
        }
    };

    match drained {
        Some((out, err)) => {
            for joined in [out, err] {
                if let Err(e) = joined {
                    warn!(script = invocation.script, "Output forwarder failed: {}", e);
                }
            }
        }
        None => {
            warn!(
                script = invocation.script,
                "Output still open after exit, detaching from background processes"
            );
            stdout_task.abort();
            stderr_task.abort();
        }
    }

    let status = status.map_err(|e| RepoError::io("failed to wait for script", e))?;
    if !status.success() {
        return Err(RepoError::ScriptFailed {
            script: invocation.script.to_string(),
            status: status.to_string(),
        });
    }

    debug!(script = invocation.script, "Script finished");
    Ok(())
}

/// SIGKILL every process in the script's group
#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(id) = group else { return };
    if let Err(e) = killpg(Pid::from_raw(id as i32), Signal::SIGKILL) {
        debug!(group = id, "Process group already gone: {}", e);
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), RepoError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| RepoError::io("failed to make script executable", e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), RepoError> {
    Ok(())
}

/// Forward each line read from `reader` to the sink.
///
/// A line over [`MAX_LINE_LENGTH`] is discarded up to its newline and
/// reported with a notice. Bytes that are not UTF-8 are replaced.
async fn forward_lines<R>(reader: R, sink: Arc<dyn EventSink>, severity: Severity)
where
    R: AsyncRead + Unpin,
{
    let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), MAX_LINE_LENGTH);
    let mut lines = FramedRead::new(reader, codec);
    let mut after_error = false;

    loop {
        match lines.next().await {
            Some(Ok(line)) => {
                after_error = false;
                let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
                sink.log(&String::from_utf8_lossy(line), severity);
            }
            Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                after_error = true;
                sink.log(
                    &format!("[line longer than {} bytes omitted]", MAX_LINE_LENGTH),
                    severity,
                );
            }
            Some(Err(AnyDelimiterCodecError::Io(e))) => {
                warn!("Error reading script output: {}", e);
                break;
            }
            // A decode error is followed by one `None`, then the stream resumes.
            None if after_error => after_error = false,
            None => break,
        }
    }
}
