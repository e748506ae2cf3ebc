//! Snapshot assembly for the metrics syscalls.

use clove_core::{SyscallError, SyscallResult};
use serde_json::{Value, json};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::proc;

/// Jiffies per second; Linux has reported 100 for every mainstream arch
/// since 2.6.
const CLK_TCK: f64 = 100.0;

/// Samples `/proc` and cgroup files into the wire snapshots.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// Gap between the two samples a CPU percentage derives from.
    sample_interval: Duration,
    started_at: Instant,
}

impl MetricsCollector {
    /// Create a collector with the default 100 ms sampling interval.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sample_interval: Duration::from_millis(100),
            started_at: Instant::now(),
        }
    }

    /// Override the sampling interval (tests).
    #[must_use]
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// `SYS_METRICS_SYSTEM` snapshot.
    ///
    /// # Errors
    ///
    /// `Unavailable` when `/proc` cannot be read.
    pub async fn system(&self, llm_queue_depth: usize) -> SyscallResult<Value> {
        let first = proc::parse_stat(&read_proc("/proc/stat").await?)
            .ok_or_else(|| unavailable("unparseable /proc/stat"))?;
        tokio::time::sleep(self.sample_interval).await;
        let second = proc::parse_stat(&read_proc("/proc/stat").await?)
            .ok_or_else(|| unavailable("unparseable /proc/stat"))?;

        let load = proc::parse_loadavg(&read_proc("/proc/loadavg").await?);
        let (mem_total, mem_used, mem_percent) =
            proc::parse_meminfo(&read_proc("/proc/meminfo").await?);
        let (disk_read, disk_write) =
            proc::parse_diskstats(&read_proc("/proc/diskstats").await?);
        let (net_sent, net_recv) = proc::parse_netdev(&read_proc("/proc/net/dev").await?);

        Ok(json!({
            "cpu_percent": second.percent_since(first),
            "load_avg": load,
            "memory": {
                "total_kb": mem_total,
                "used_kb": mem_used,
                "percent": mem_percent,
            },
            "disk": {"read_bytes": disk_read, "write_bytes": disk_write},
            "network": {"bytes_sent": net_sent, "bytes_recv": net_recv},
            "llm_queue_depth": llm_queue_depth,
            "uptime_s": self.started_at.elapsed().as_secs(),
        }))
    }

    /// `SYS_METRICS_AGENT` snapshot for one pid.
    ///
    /// # Errors
    ///
    /// `NotFound` when the process is gone, `Unavailable` when `/proc` is
    /// unreadable.
    pub async fn agent(&self, agent_id: u32, pid: u32) -> SyscallResult<Value> {
        let stat_path = format!("/proc/{pid}/stat");
        let (first_jiffies, _) = proc::parse_pid_stat(&read_pid(&stat_path).await?)
            .ok_or_else(|| unavailable("unparseable pid stat"))?;
        let total_first = proc::parse_stat(&read_proc("/proc/stat").await?)
            .ok_or_else(|| unavailable("unparseable /proc/stat"))?;

        tokio::time::sleep(self.sample_interval).await;

        let (second_jiffies, state) = proc::parse_pid_stat(&read_pid(&stat_path).await?)
            .ok_or_else(|| unavailable("unparseable pid stat"))?;
        let total_second = proc::parse_stat(&read_proc("/proc/stat").await?)
            .ok_or_else(|| unavailable("unparseable /proc/stat"))?;

        let elapsed = total_second.total.saturating_sub(total_first.total);
        #[allow(clippy::cast_precision_loss)]
        let cpu_percent = if elapsed == 0 {
            0.0
        } else {
            let busy = second_jiffies.saturating_sub(first_jiffies) as f64;
            // Whole-system jiffies grow CLK_TCK per second per core; scale a
            // single process against one core.
            let seconds = elapsed as f64 / CLK_TCK / num_cpus_estimate();
            (busy / CLK_TCK / seconds * 100.0).clamp(0.0, 400.0)
        };

        let rss_kb = proc::parse_pid_rss(&read_pid(&format!("/proc/{pid}/status")).await?);

        Ok(json!({
            "agent_id": agent_id,
            "pid": pid,
            "cpu_percent": cpu_percent,
            "rss_kb": rss_kb,
            "state": state.to_string(),
        }))
    }

    /// `SYS_METRICS_CGROUP` snapshot for a cgroup directory.
    ///
    /// # Errors
    ///
    /// `NotFound` when the directory or its stat files are missing.
    pub async fn cgroup(&self, path: &Path) -> SyscallResult<Value> {
        let read = |file: &str| {
            let full = path.join(file);
            async move {
                tokio::fs::read_to_string(&full).await.map_err(|e| {
                    SyscallError::not_found(format!("cgroup file {}: {e}", full.display()))
                })
            }
        };

        let usage = proc::parse_cpu_stat_usage(&read("cpu.stat").await?);
        let memory_current = proc::parse_limit(&read("memory.current").await?);
        let memory_max = proc::parse_limit(&read("memory.max").await?);
        let pids_current = proc::parse_limit(&read("pids.current").await?);
        let pids_max = proc::parse_limit(&read("pids.max").await?);

        debug!(path = %path.display(), "Sampled cgroup");
        Ok(json!({
            "cgroup_path": path.display().to_string(),
            "cpu_usage_usec": usage,
            "memory_current": memory_current,
            "memory_max": memory_max,
            "pids_current": pids_current,
            "pids_max": pids_max,
        }))
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_proc(path: &str) -> SyscallResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| unavailable(&format!("{path}: {e}")))
}

async fn read_pid(path: &str) -> SyscallResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|_| SyscallError::not_found("no such process"))
}

fn unavailable(msg: &str) -> SyscallError {
    SyscallError::Unavailable(format!("metrics sampling failed: {msg}"))
}

#[allow(clippy::cast_precision_loss)]
fn num_cpus_estimate() -> f64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as f64)
        .unwrap_or(1.0)
}
