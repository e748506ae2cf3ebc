//! The FIFO scheduler in front of the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::types::{ThinkRequest, ThinkResponse};
use crate::worker::LlmWorker;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Worker command line (`argv[0]` plus arguments).
    pub command: Vec<String>,
    /// Per-request deadline.
    pub request_timeout: Duration,
    /// Forwarded to the worker as `API_KEY`.
    pub api_key: Option<String>,
}

impl LlmConfig {
    /// Config for a worker command with default timeout.
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            request_timeout: Duration::from_secs(120),
            api_key: None,
        }
    }
}

struct Job {
    request: ThinkRequest,
    reply: oneshot::Sender<ThinkResponse>,
}

/// Handle used by syscall handlers to submit `SYS_THINK` requests.
///
/// Cloneable; all clones feed the same queue and the same worker. Ordering
/// across all sessions is the arrival order at the queue.
#[derive(Clone)]
pub struct LlmScheduler {
    tx: mpsc::UnboundedSender<Job>,
    queue_depth: Arc<AtomicUsize>,
}

impl LlmScheduler {
    /// Start the scheduler task. The worker itself is spawned lazily on the
    /// first request (and again after a failure).
    #[must_use]
    pub fn start(config: LlmConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue_depth = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run_worker_task(config, rx, Arc::clone(&queue_depth)));
        Self { tx, queue_depth }
    }

    /// Submit a request and wait for its paired response.
    ///
    /// Never returns an `Err`: worker failures come back as
    /// `{success:false, error:"llm worker unavailable"}` responses.
    pub async fn think(&self, request: ThinkRequest) -> ThinkResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
        let submitted = self.tx.send(Job {
            request,
            reply: reply_tx,
        });
        if submitted.is_err() {
            self.queue_depth.fetch_sub(1, Ordering::Relaxed);
            return ThinkResponse::unavailable();
        }
        match reply_rx.await {
            Ok(response) => response,
            Err(_) => ThinkResponse::unavailable(),
        }
    }

    /// Number of requests submitted but not yet answered.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for LlmScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmScheduler")
            .field("queue_depth", &self.queue_depth())
            .finish_non_exhaustive()
    }
}

/// The single task owning the worker's stdin/stdout.
async fn run_worker_task(
    config: LlmConfig,
    mut rx: mpsc::UnboundedReceiver<Job>,
    queue_depth: Arc<AtomicUsize>,
) {
    let mut worker: Option<LlmWorker> = None;

    while let Some(job) = rx.recv().await {
        // Lazy (re)spawn on the first request after startup or a failure.
        if worker.is_none() {
            match LlmWorker::spawn(&config.command, config.api_key.as_deref()) {
                Ok(w) => {
                    info!("llm worker started");
                    worker = Some(w);
                },
                Err(e) => {
                    warn!(error = %e, "llm worker spawn failed");
                    finish(&queue_depth, job.reply, ThinkResponse::unavailable());
                    drain_queue(&mut rx, &queue_depth);
                    continue;
                },
            }
        }

        let Some(active) = worker.as_mut() else {
            continue;
        };
        match active.ask(&job.request, config.request_timeout).await {
            Ok(response) => finish(&queue_depth, job.reply, response),
            Err(e) => {
                warn!(error = %e, "llm worker failed; discarding it");
                if let Some(dead) = worker.take() {
                    dead.shutdown().await;
                }
                // Fail the in-flight request once, then everything queued
                // behind it. The next request attempts a restart.
                finish(&queue_depth, job.reply, ThinkResponse::unavailable());
                drain_queue(&mut rx, &queue_depth);
            },
        }
    }
}

fn finish(
    queue_depth: &AtomicUsize,
    reply: oneshot::Sender<ThinkResponse>,
    response: ThinkResponse,
) {
    queue_depth.fetch_sub(1, Ordering::Relaxed);
    let _ = reply.send(response);
}

fn drain_queue(rx: &mut mpsc::UnboundedReceiver<Job>, queue_depth: &AtomicUsize) {
    while let Ok(job) = rx.try_recv() {
        finish(queue_depth, job.reply, ThinkResponse::unavailable());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request(prompt: &str) -> ThinkRequest {
        ThinkRequest {
            prompt: prompt.to_string(),
            model: None,
            temperature: None,
            max_tokens: None,
            thinking_level: None,
            system_instruction: None,
            image: None,
            tools: None,
        }
    }

    fn stub_config(dir: &tempfile::TempDir, body: &str) -> LlmConfig {
        let path = dir.path().join("worker.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        LlmConfig::new(vec!["/bin/sh".to_string(), path.display().to_string()])
    }

    #[tokio::test]
    async fn test_fifo_pairing() {
        let dir = tempfile::tempdir().unwrap();
        // The stub numbers its responses, exposing the order it saw requests.
        let config = stub_config(
            &dir,
            r#"n=0
while IFS= read -r line; do
  n=$((n+1))
  printf '{"success":true,"content":"reply-%s"}\n' "$n"
done"#,
        );
        let scheduler = LlmScheduler::start(config);

        let first = scheduler.think(request("one")).await;
        let second = scheduler.think(request("two")).await;
        assert_eq!(first.content, "reply-1");
        assert_eq!(second.content, "reply-2");
    }

    #[tokio::test]
    async fn test_worker_failure_then_lazy_restart() {
        let dir = tempfile::tempdir().unwrap();
        // Answers one request, then dies. Each incarnation does the same.
        let config = stub_config(
            &dir,
            r#"IFS= read -r line
printf '{"success":true,"content":"alive"}\n'"#,
        );
        let scheduler = LlmScheduler::start(config);

        let ok = scheduler.think(request("a")).await;
        assert!(ok.success);

        // The worker exited after the first answer; this request hits the
        // closed pipe and fails once.
        let failed = scheduler.think(request("b")).await;
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("llm worker unavailable"));

        // The next request respawns the worker.
        let recovered = scheduler.think(request("c")).await;
        assert!(recovered.success);
        assert_eq!(recovered.content, "alive");
    }

    #[tokio::test]
    async fn test_unspawnable_worker_reports_unavailable() {
        let config = LlmConfig::new(vec!["/nonexistent/clove-llm-worker".to_string()]);
        let scheduler = LlmScheduler::start(config);
        let response = scheduler.think(request("x")).await;
        assert!(!response.success);
        assert_eq!(scheduler.queue_depth(), 0);
    }
}
