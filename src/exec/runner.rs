//! Shell command spawning with stdout streamed into a caller-supplied sink.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Error type for command execution.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The process could not be spawned or its output could not be copied.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The process stdout handle was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// The process ran but exited with a failure status.
    #[error("command exited with {status}")]
    Failed {
        /// Exit status reported by the operating system.
        status: std::process::ExitStatus,
    },
}

/// A sink for a command's standard output.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Runs a command string to completion, streaming its stdout into a sink.
///
/// Implementations own the sink and must close it (dropping is enough) when
/// the command finishes, so readers on the other end observe end-of-stream
/// whether the command succeeded or failed.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion, writing its stdout into `out`.
    ///
    /// # Errors
    ///
    /// Returns `RunError` if the process cannot be spawned, its output
    /// cannot be copied, or it exits with a failure status.
    async fn run(&self, cmd: &str, out: OutputSink) -> Result<(), RunError>;
}

/// Runs command strings through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, cmd: &str, mut out: OutputSink) -> Result<(), RunError> {
        tracing::debug!(cmd = %cmd, "spawning command");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let mut stdout = child.stdout.take().ok_or(RunError::NoStdout)?;

        if let Err(err) = tokio::io::copy(&mut stdout, &mut out).await {
            // The consumer hung up; the command's output is no longer wanted.
            let _ = child.kill().await;
            let _ = child.wait().await;
            return Err(RunError::Io(err));
        }
        out.shutdown().await?;

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            tracing::warn!(%status, cmd = %cmd, "command failed");
            Err(RunError::Failed { status })
        }
    }
}
