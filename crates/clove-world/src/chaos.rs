//! The chaos engine.

use clove_core::{SyscallError, SyscallResult};
use globset::GlobBuilder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::ChaosConfig;

/// Counters reported in world state and snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChaosMetrics {
    /// One-shot events injected via `SYS_WORLD_EVENT`.
    pub injected_events: u64,
    /// Operations failed by the engine.
    pub triggered_failures: u64,
    /// Total artificial latency handed out.
    pub injected_latency_ms: u64,
}

/// Kinds of file operation the engine can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// A `SYS_READ` through the world VFS.
    Read,
    /// A `SYS_WRITE` through the world VFS.
    Write,
}

/// Per-world fault injection.
///
/// Two layers: a configured probabilistic envelope (base failure rate plus
/// targeted rules) and one-shot faults injected at runtime that persist
/// until their matching `*_restore` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosEngine {
    config: ChaosConfig,
    active_faults: BTreeSet<String>,
    metrics: ChaosMetrics,
}

impl ChaosEngine {
    /// Build an engine from config.
    #[must_use]
    pub fn from_config(config: &ChaosConfig) -> Self {
        Self {
            config: config.clone(),
            active_faults: BTreeSet::new(),
            metrics: ChaosMetrics::default(),
        }
    }

    /// Inject or clear a one-shot fault.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an unknown event type.
    pub fn inject(&mut self, event_type: &str) -> SyscallResult<()> {
        match event_type {
            "disk_fail" | "network_fail" => {
                self.active_faults.insert(event_type.to_string());
                self.metrics.injected_events = self.metrics.injected_events.saturating_add(1);
                debug!(event_type, "Chaos fault injected");
                Ok(())
            },
            "disk_restore" => {
                self.active_faults.remove("disk_fail");
                Ok(())
            },
            "network_restore" => {
                self.active_faults.remove("network_fail");
                Ok(())
            },
            other => Err(SyscallError::bad_request(format!(
                "unknown chaos event: {other}"
            ))),
        }
    }

    /// Decide whether a file operation fails. Returns the failure message.
    pub fn check_file(&mut self, path: &str, op: FileOp) -> Option<String> {
        if self.active_faults.contains("disk_fail") {
            self.metrics.triggered_failures = self.metrics.triggered_failures.saturating_add(1);
            return Some("disk failure (chaos)".to_string());
        }
        if !self.config.enabled {
            return None;
        }

        let rule_kind = match op {
            FileOp::Read => "file_read_fail",
            FileOp::Write => "file_write_fail",
        };
        let mut rng = rand::thread_rng();
        for rule in &self.config.rules {
            if rule.rule_type == rule_kind
                && matches_pattern(&rule.path_pattern, path)
                && rng.r#gen::<f64>() < rule.probability
            {
                self.metrics.triggered_failures = self.metrics.triggered_failures.saturating_add(1);
                return Some(format!("{rule_kind} (chaos)"));
            }
        }
        if self.config.failure_rate > 0.0 && rng.r#gen::<f64>() < self.config.failure_rate {
            self.metrics.triggered_failures = self.metrics.triggered_failures.saturating_add(1);
            return Some("injected failure (chaos)".to_string());
        }
        None
    }

    /// Whether network operations are currently failed.
    pub fn network_failed(&mut self) -> bool {
        if self.active_faults.contains("network_fail") {
            self.metrics.triggered_failures = self.metrics.triggered_failures.saturating_add(1);
            return true;
        }
        false
    }

    /// Latency to inject for the next operation, drawn from the envelope.
    pub fn draw_latency_ms(&mut self) -> u64 {
        if !self.config.enabled {
            return 0;
        }
        let envelope = self.config.latency;
        if envelope.max_ms == 0 || envelope.max_ms <= envelope.min_ms {
            return envelope.min_ms;
        }
        let ms = rand::thread_rng().gen_range(envelope.min_ms..=envelope.max_ms);
        self.metrics.injected_latency_ms = self.metrics.injected_latency_ms.saturating_add(ms);
        ms
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> &ChaosMetrics {
        &self.metrics
    }

    /// Overwrite counters (snapshot restore).
    pub fn set_metrics(&mut self, metrics: ChaosMetrics) {
        self.metrics = metrics;
    }
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher().is_match(path))
        .unwrap_or(false)
}
