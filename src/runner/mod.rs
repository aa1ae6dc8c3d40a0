//! Safe command execution with workspace bounds, timeouts, and output caps.
//!
//! Every external tool invocation in vordr goes through [`Runner`]. The
//! runner refuses to spawn outside the workspace, kills children that
//! exceed the configured deadline, and caps how much of each stream is
//! retained so a chatty tool cannot exhaust memory.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

/// Errors from command execution. All of these are transport-level:
/// a tool that ran and exited non-zero is NOT an error (see [`RunOutput`]).
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("empty argv")]
    EmptyArgv,

    #[error("cwd {cwd:?} is outside workspace {workspace:?}")]
    OutsideWorkspace { cwd: String, workspace: PathBuf },

    #[error("executing {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("executing {binary}: timed out after {timeout:?}")]
    Timeout { binary: String, timeout: Duration },

    #[error("capturing output of {binary}: {source}")]
    Capture {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// The captured output of a command execution.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Unique identifier for this invocation.
    pub run_id: String,
    /// Process exit code (0 on success).
    pub exit_code: i32,
    /// Captured stdout (may be truncated).
    pub stdout: Vec<u8>,
    /// Captured stderr (may be truncated).
    pub stderr: Vec<u8>,
    /// True if either stream reached the size cap.
    pub truncated: bool,
}

/// Abstraction over command execution, implemented by [`Runner`].
/// The workflow engine depends on this trait so tests can script outputs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String], cwd: &str) -> Result<RunOutput, RunnerError>;
}

/// Executes commands within a workspace boundary.
#[derive(Debug, Clone)]
pub struct Runner {
    pub workspace: PathBuf,
    pub timeout: Duration,
    pub max_output: usize,
}

impl Runner {
    pub fn new(workspace: impl Into<PathBuf>, timeout: Duration, max_output: usize) -> Self {
        Runner {
            workspace: workspace.into(),
            timeout,
            max_output,
        }
    }

    /// Resolves cwd relative to the workspace and validates it stays
    /// within the workspace boundary. Purely lexical, like the spawn
    /// itself would be: the directory need not exist yet.
    fn resolve_dir(&self, cwd: &str) -> Result<PathBuf, RunnerError> {
        if cwd.is_empty() {
            return Ok(self.workspace.clone());
        }

        let raw = Path::new(cwd);
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.workspace.join(raw)
        };

        let dir = normalize(&joined);
        let root = normalize(&self.workspace);
        if !dir.starts_with(&root) {
            return Err(RunnerError::OutsideWorkspace {
                cwd: cwd.to_string(),
                workspace: self.workspace.clone(),
            });
        }
        Ok(dir)
    }
}

#[async_trait]
impl CommandRunner for Runner {
    /// Executes a command with the given argv. The first element is the
    /// binary name (resolved via PATH), the rest are arguments. A non-zero
    /// child exit is reported through `exit_code`; only failure to launch,
    /// a deadline hit, or a workspace violation produce an error. On
    /// timeout the child is killed and the partial buffers are discarded.
    async fn run(&self, argv: &[String], cwd: &str) -> Result<RunOutput, RunnerError> {
        let Some(binary) = argv.first() else {
            return Err(RunnerError::EmptyArgv);
        };

        let dir = self.resolve_dir(cwd)?;
        debug!(command = %argv.join(" "), dir = %dir.display(), "running command");

        let mut child = Command::new(binary)
            .args(&argv[1..])
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        // Drain both pipes concurrently with the wait so a child that
        // fills its pipe buffer cannot deadlock against us.
        let stdout_pipe = child.stdout.take().expect("stdout piped");
        let stderr_pipe = child.stderr.take().expect("stderr piped");
        let cap = self.max_output;
        let out_task = tokio::spawn(read_limited(stdout_pipe, cap));
        let err_task = tokio::spawn(read_limited(stderr_pipe, cap));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited.map_err(|source| RunnerError::Capture {
                binary: binary.clone(),
                source,
            })?,
            Err(_) => {
                let _ = child.kill().await;
                out_task.abort();
                err_task.abort();
                return Err(RunnerError::Timeout {
                    binary: binary.clone(),
                    timeout: self.timeout,
                });
            }
        };

        let stdout = join_capture(out_task, binary).await?;
        let stderr = join_capture(err_task, binary).await?;
        let truncated = stdout.len() >= cap || stderr.len() >= cap;

        Ok(RunOutput {
            run_id: Uuid::new_v4().to_string(),
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            truncated,
        })
    }
}

/// Reads a stream to EOF, retaining at most `cap` bytes. Bytes past the
/// cap are consumed and dropped so the child never blocks on a full pipe.
async fn read_limited<R: AsyncReadExt + Unpin>(mut r: R, cap: usize) -> std::io::Result<Vec<u8>> {
    let mut retained = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = r.read(&mut chunk).await?;
        if n == 0 {
            return Ok(retained);
        }
        let remaining = cap.saturating_sub(retained.len());
        if remaining > 0 {
            retained.extend_from_slice(&chunk[..n.min(remaining)]);
        }
    }
}

async fn join_capture(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    binary: &str,
) -> Result<Vec<u8>, RunnerError> {
    match task.await {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(source)) => Err(RunnerError::Capture {
            binary: binary.to_string(),
            source,
        }),
        Err(join) => Err(RunnerError::Capture {
            binary: binary.to_string(),
            source: std::io::Error::other(join),
        }),
    }
}

/// Lexically normalizes a path: resolves `.` and `..` components without
/// touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let absolute = path.is_absolute();
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !absolute {
                    // Ascending past the root of a relative path keeps
                    // the traversal visible; past "/" it is a no-op.
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
