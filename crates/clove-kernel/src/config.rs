//! Kernel configuration.
//!
//! Loaded from a TOML file (`clove.toml` next to the binary by default),
//! every field has a sensible default so an empty file is valid. The CLI
//! overrides the socket path and the worker command.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/clove.sock")
}

fn default_working_area() -> PathBuf {
    PathBuf::from("/tmp/clove")
}

fn default_level() -> String {
    "standard".to_string()
}

fn default_mailbox_capacity() -> usize {
    1024
}

fn default_event_backlog() -> usize {
    256
}

fn default_read_cap() -> u64 {
    10 * 1024 * 1024
}

fn default_exec_output_cap() -> usize {
    1024 * 1024
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    120
}

fn default_interpreter() -> Vec<String> {
    vec!["/bin/sh".to_string()]
}

fn default_cgroup_root() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup/clove")
}

fn default_kill_grace() -> u64 {
    2
}

fn default_backoff_base() -> u64 {
    2
}

fn default_backoff_cap() -> u64 {
    10
}

/// LLM worker section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Worker command line; empty disables `SYS_THINK` (requests fail with
    /// "llm worker unavailable").
    pub worker_command: Vec<String>,
    /// Per-request deadline in seconds.
    pub request_timeout_s: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            worker_command: Vec::new(),
            request_timeout_s: default_request_timeout(),
        }
    }
}

/// Supervisor section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    /// Interpreter prefix for agent scripts.
    pub interpreter: Vec<String>,
    /// Root directory for per-child cgroups.
    pub cgroup_root: PathBuf,
    /// Seconds between SIGTERM and SIGKILL on `SYS_KILL`.
    pub kill_grace_s: u64,
    /// Restart backoff per attempt, seconds.
    pub backoff_base_s: u64,
    /// Restart backoff cap, seconds.
    pub backoff_cap_s: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            cgroup_root: default_cgroup_root(),
            kill_grace_s: default_kill_grace(),
            backoff_base_s: default_backoff_base(),
            backoff_cap_s: default_backoff_cap(),
        }
    }
}

/// The kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Unix socket path; permissions are restricted to the owning user.
    pub socket_path: PathBuf,
    /// Directory the `standard` and `sandboxed` permission levels scope to.
    pub working_area: PathBuf,
    /// Permission level new sessions start at.
    pub default_level: String,
    /// Per-agent mailbox capacity.
    pub mailbox_capacity: usize,
    /// Per-session event backlog capacity.
    pub event_backlog: usize,
    /// `SYS_READ` content cap in bytes.
    pub read_cap_bytes: u64,
    /// Combined stdout+stderr cap for `SYS_EXEC`.
    pub exec_output_cap: usize,
    /// State store sweep cadence, seconds.
    pub sweep_interval_s: u64,
    /// LLM worker settings.
    pub llm: LlmSection,
    /// Supervisor settings.
    pub supervisor: SupervisorSection,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            working_area: default_working_area(),
            default_level: default_level(),
            mailbox_capacity: default_mailbox_capacity(),
            event_backlog: default_event_backlog(),
            read_cap_bytes: default_read_cap(),
            exec_output_cap: default_exec_output_cap(),
            sweep_interval_s: default_sweep_interval(),
            llm: LlmSection::default(),
            supervisor: SupervisorSection::default(),
        }
    }
}

impl KernelConfig {
    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the file is unreadable or does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
