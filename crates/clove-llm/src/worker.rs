//! The worker subprocess handle.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::types::{ThinkRequest, ThinkResponse};

/// Errors from the worker dialog. Any of these marks the worker unhealthy.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker could not be spawned.
    #[error("failed to spawn llm worker: {0}")]
    Spawn(std::io::Error),

    /// Writing the request or reading the response failed.
    #[error("llm worker i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The worker closed stdout mid-dialog.
    #[error("llm worker closed its stdout")]
    ClosedPipe,

    /// The worker's response line was not valid JSON.
    #[error("llm worker produced malformed response: {0}")]
    Malformed(serde_json::Error),

    /// The worker did not answer within the deadline.
    ///
    /// After a timeout the pairing between requests and response lines can
    /// no longer be trusted, so the worker must be discarded.
    #[error("llm worker timed out after {0:?}")]
    Timeout(Duration),
}

/// Handle to the one live worker subprocess.
///
/// Owned exclusively by the scheduler task; nothing else touches the pipes.
#[derive(Debug)]
pub struct LlmWorker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl LlmWorker {
    /// Spawn the worker from a command line (`argv[0]` plus arguments).
    ///
    /// `api_key`, when present, is forwarded as the `API_KEY` environment
    /// variable. The worker's stderr is inherited so its diagnostics land in
    /// the kernel's log stream.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] when the process cannot start or its
    /// pipes are unavailable.
    pub fn spawn(command: &[String], api_key: Option<&str>) -> Result<Self, WorkerError> {
        let Some((program, args)) = command.split_first() else {
            return Err(WorkerError::Spawn(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty worker command",
            )));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(key) = api_key {
            cmd.env("API_KEY", key);
        }

        let mut child = cmd.spawn().map_err(WorkerError::Spawn)?;
        let stdin = child.stdin.take().ok_or_else(|| {
            WorkerError::Spawn(std::io::Error::other("worker stdin unavailable"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            WorkerError::Spawn(std::io::Error::other("worker stdout unavailable"))
        })?;

        debug!(program = %program, "Spawned llm worker");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Send one request line and read exactly one response line.
    ///
    /// # Errors
    ///
    /// Any error means the dialog is desynchronized and the worker must be
    /// discarded by the caller.
    pub async fn ask(
        &mut self,
        request: &ThinkRequest,
        timeout: Duration,
    ) -> Result<ThinkResponse, WorkerError> {
        let mut line = serde_json::to_string(request).map_err(WorkerError::Malformed)?;
        line.push('\n');

        let dialog = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await?;

            let mut response_line = String::new();
            let n = self.stdout.read_line(&mut response_line).await?;
            if n == 0 {
                return Err(WorkerError::ClosedPipe);
            }
            serde_json::from_str(&response_line).map_err(WorkerError::Malformed)
        };

        match tokio::time::timeout(timeout, dialog).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(timeout)),
        }
    }

    /// Kill the worker process. Used when discarding an unhealthy worker.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to kill llm worker");
        }
    }
}
