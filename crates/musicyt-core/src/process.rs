//! External process execution.
//!
//! Two distinct operations are exposed through [`ProcessRunner`]:
//! - [`ProcessRunner::run`] runs a program to completion and collects its output.
//! - [`ProcessRunner::run_streaming`] additionally forwards stdout lines as they
//!   are produced, so callers can parse live progress.
//!
//! Both resolve with the exit code and the captured stdout/stderr, fail with
//! [`ProcessError::Spawn`] when the program cannot be started, and with
//! [`ProcessError::NonZeroExit`] (stderr as payload) on a failing exit code.
//! Every invocation is logged before and after it runs.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, Error, ProcessError, Result};

/// How often a running child checks the cancel flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read buffer size for child pipes.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code (0 on success).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

/// Stdout interpreted as structured data when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput {
    /// Stdout parsed as JSON.
    Json(Value),
    /// Stdout that was not valid JSON.
    Text(String),
}

impl ProcessOutput {
    /// Create a successful output with the given stdout text.
    #[must_use]
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Stdout decoded as (lossy) UTF-8.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Parse stdout as JSON, falling back to raw text on parse failure.
    #[must_use]
    pub fn structured(&self) -> StructuredOutput {
        match serde_json::from_slice::<Value>(&self.stdout) {
            Ok(value) => StructuredOutput::Json(value),
            Err(e) => {
                debug!("Process output is not JSON ({}), returning raw text", e);
                StructuredOutput::Text(self.stdout_text())
            }
        }
    }
}

/// Runs external executables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` to completion and collect its output.
    async fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput>;

    /// Run `program` with `args`, forwarding each stdout line to `lines` while
    /// it executes. The sender is dropped once stdout is exhausted.
    async fn run_streaming(
        &self,
        program: &Path,
        args: &[String],
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// Children are killed when the shared cancel flag is raised, in which case
/// the call fails with [`DownloadError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    cancel_flag: Arc<AtomicBool>,
}

impl TokioProcessRunner {
    /// Create a runner that never gets cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner observing an external cancel flag.
    #[must_use]
    pub const fn with_cancel_flag(cancel_flag: Arc<AtomicBool>) -> Self {
        Self { cancel_flag }
    }

    async fn execute(
        &self,
        program: &Path,
        args: &[String],
        lines: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<ProcessOutput> {
        info!("Spawning: {} {}", program.display(), args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            warn!("Spawn error for {}: {}", program.display(), e);
            Error::Process(ProcessError::Spawn {
                program: program.to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        let pipe_error = |name: &str| {
            Error::Process(ProcessError::Io {
                program: program.to_path_buf(),
                reason: format!("{name} was not captured"),
            })
        };
        let stdout = child.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

        let (stdout, stderr, status) = tokio::join!(
            drain(stdout, lines),
            drain(stderr, None),
            self.wait_or_cancel(&mut child),
        );

        let io_error = |e: std::io::Error| {
            Error::Process(ProcessError::Io {
                program: program.to_path_buf(),
                reason: e.to_string(),
            })
        };
        let stdout = stdout.map_err(io_error)?;
        let stderr = stderr.map_err(io_error)?;
        let Some(status) = status.map_err(io_error)? else {
            info!("Cancelled: {}", program.display());
            return Err(Error::Download(DownloadError::Cancelled));
        };

        let exit_code = status.code();
        info!(
            "Finished: {} (exit code {:?})",
            program.display(),
            exit_code
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            warn!("{} failed: {}", program.display(), stderr);
            return Err(Error::Process(ProcessError::NonZeroExit {
                program: program.to_path_buf(),
                exit_code,
                stderr,
            }));
        }

        Ok(ProcessOutput {
            exit_code: exit_code.unwrap_or_default(),
            stdout,
            stderr,
        })
    }

    /// Wait for the child, killing it if the cancel flag is raised.
    ///
    /// Returns `None` when the child was killed because of cancellation.
    async fn wait_or_cancel(&self, child: &mut Child) -> std::io::Result<Option<ExitStatus>> {
        loop {
            tokio::select! {
                status = child.wait() => return status.map(Some),
                () = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {
                    if self.cancel_flag.load(Ordering::SeqCst) {
                        child.start_kill()?;
                        child.wait().await?;
                        return Ok(None);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput> {
        self.execute(program, args, None).await
    }

    async fn run_streaming(
        &self,
        program: &Path,
        args: &[String],
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<ProcessOutput> {
        self.execute(program, args, Some(lines)).await
    }
}

/// Read a pipe to the end, optionally forwarding complete lines.
///
/// Lines are split on both `\n` and `\r` since progress output redraws the
/// current line with carriage returns.
async fn drain<R>(
    mut reader: R,
    lines: Option<mpsc::UnboundedSender<String>>,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let mut pending = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);

        if let Some(tx) = &lines {
            for &byte in &buf[..n] {
                if byte == b'\n' || byte == b'\r' {
                    flush_line(tx, &mut pending);
                } else {
                    pending.push(byte);
                }
            }
        }
    }

    if let Some(tx) = &lines {
        flush_line(tx, &mut pending);
    }

    Ok(collected)
}

fn flush_line(tx: &mpsc::UnboundedSender<String>, pending: &mut Vec<u8>) {
    if pending.is_empty() {
        return;
    }
    // Receiver gone means nobody is watching progress; keep draining anyway.
    let _ = tx.send(String::from_utf8_lossy(pending).into_owned());
    pending.clear();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_json() {
        let output = ProcessOutput::success(r#"{"title": "Song"}"#);
        match output.structured() {
            StructuredOutput::Json(v) => assert_eq!(v["title"], "Song"),
            StructuredOutput::Text(_) => panic!("expected JSON"),
        }
    }

    #[test]
    fn test_structured_falls_back_to_text() {
        let output = ProcessOutput::success("not json at all");
        assert_eq!(
            output.structured(),
            StructuredOutput::Text("not json at all".to_string())
        );
    }

    #[tokio::test]
    async fn test_drain_splits_on_cr_and_lf() {
        let input: &[u8] = b"[download]  10.0%\r[download]  55.5%\r\nDone\nlast";
        let (tx, mut rx) = mpsc::unbounded_channel();

        let collected = drain(input, Some(tx)).await.unwrap();
        assert_eq!(collected, input);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec!["[download]  10.0%", "[download]  55.5%", "Done", "last"]
        );
    }

    #[tokio::test]
    async fn test_spawn_error_for_missing_binary() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(Path::new("/definitely/not/a/real/binary"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Process(ProcessError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_collects_stdout() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(Path::new("sh"), &["-c".to_string(), "printf hello".to_string()])
            .await
            .unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout_text(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(
                Path::new("sh"),
                &["-c".to_string(), "echo 'ERROR: Private video' >&2; exit 3".to_string()],
            )
            .await
            .unwrap_err();
        match err {
            Error::Process(ProcessError::NonZeroExit {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "ERROR: Private video");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_streaming_forwards_lines() {
        let runner = TokioProcessRunner::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let output = runner
            .run_streaming(
                Path::new("sh"),
                &["-c".to_string(), "echo one; echo two".to_string()],
                tx,
            )
            .await
            .unwrap();
        assert_eq!(output.stdout_text(), "one\ntwo\n");

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_flag_kills_child() {
        let flag = Arc::new(AtomicBool::new(true));
        let runner = TokioProcessRunner::with_cancel_flag(flag);
        let err = runner
            .run(Path::new("sh"), &["-c".to_string(), "exec sleep 30".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
