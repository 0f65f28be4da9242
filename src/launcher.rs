//! Installer process launch seam, with a tokio-backed default.
//!
//! The default launcher runs the installer with piped stdio, captures both
//! streams, and races completion against the cancellation signal. A
//! cancelled launch kills the child and reports failure; cancellation is
//! never treated as partial success.

use crate::executor::CancelFlag;
use crate::models::ExecutionResult;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Launches installer binaries on behalf of the executor.
#[async_trait]
pub trait InstallerLauncher: Send + Sync {
    /// Runs `path` with `args`, capturing exit code, stdout and stderr.
    /// The error string covers spawn failures and cancellation; a non-zero
    /// exit code is a successful launch and comes back in the result.
    async fn launch(
        &self,
        path: &Path,
        args: &[String],
        cancel: &CancelFlag,
    ) -> Result<ExecutionResult, String>;
}

/// Default launcher backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl TokioLauncher {
    pub fn new() -> Self {
        Self
    }
}

fn render_command_line(path: &Path, args: &[String]) -> String {
    let mut line = path.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Drains a captured stream to a string; unreadable output is dropped
/// rather than failing the launch.
async fn drain_stream(stream: Option<impl AsyncRead + Unpin>) -> String {
    let mut buffer = String::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_string(&mut buffer).await {
            log::warn!("Failed to read installer output stream: {}", e);
        }
    }
    buffer
}

#[async_trait]
impl InstallerLauncher for TokioLauncher {
    async fn launch(
        &self,
        path: &Path,
        args: &[String],
        cancel: &CancelFlag,
    ) -> Result<ExecutionResult, String> {
        let command_line = render_command_line(path, args);
        log::info!("Launching installer: {}", command_line);

        let mut cmd = Command::new(path);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        // Prevents a console window from appearing on Windows.
        #[cfg(windows)]
        cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("failed to spawn '{}': {}", command_line, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(drain_stream(stdout));
        let stderr_task = tokio::spawn(drain_stream(stderr));

        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|e| format!("failed to wait on '{}': {}", command_line, e))?
            }
            _ = cancel.cancelled() => {
                log::warn!("Cancellation requested; killing '{}'", command_line);
                if let Err(e) = child.kill().await {
                    log::error!("Failed to kill cancelled installer: {}", e);
                }
                return Err(format!("'{}' was cancelled", command_line));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        // `code()` is None when a signal terminated the process.
        let exit_code = status.code().unwrap_or(-1);
        log::info!("Installer exited with code {}: {}", exit_code, command_line);

        Ok(ExecutionResult {
            command_line,
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::cancellation_pair;

    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let result = TokioLauncher::new()
            .launch(
                Path::new("/bin/sh"),
                &["-c".into(), "echo out; echo err >&2; exit 3".into()],
                &CancelFlag::never(),
            )
            .await
            .unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
        assert!(result.command_line.starts_with("/bin/sh"));
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let result = TokioLauncher::new()
            .launch(
                Path::new("/bin/sh"),
                &["-c".into(), "true".into()],
                &CancelFlag::never(),
            )
            .await
            .unwrap();
        assert!(result.success());
    }

    #[tokio::test]
    async fn cancellation_kills_the_child_and_fails() {
        let (handle, flag) = cancellation_pair();
        handle.cancel();
        let err = TokioLauncher::new()
            .launch(
                Path::new("/bin/sh"),
                &["-c".into(), "sleep 30".into()],
                &flag,
            )
            .await
            .unwrap_err();
        assert!(err.contains("cancelled"));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let err = TokioLauncher::new()
            .launch(
                Path::new("/definitely/not/a/real/binary"),
                &[],
                &CancelFlag::never(),
            )
            .await
            .unwrap_err();
        assert!(err.contains("failed to spawn"));
    }
}
