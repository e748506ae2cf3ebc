//! The spawn specification, as carried by `SYS_SPAWN`.

use serde::{Deserialize, Serialize};

fn default_sandboxed() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    5
}

fn default_restart_window() -> u64 {
    300
}

/// What to do when a child exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Exit is final.
    #[default]
    #[serde(rename = "never")]
    Never,
    /// Restart only on a non-zero exit code.
    #[serde(rename = "on-failure")]
    OnFailure,
    /// Restart on any exit.
    #[serde(rename = "always")]
    Always,
}

impl RestartPolicy {
    /// The wire name of the policy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::OnFailure => "on-failure",
            Self::Always => "always",
        }
    }

    /// Whether an exit with `code` triggers a restart.
    #[must_use]
    pub fn should_restart(self, code: i32) -> bool {
        match self {
            Self::Never => false,
            Self::OnFailure => code != 0,
            Self::Always => true,
        }
    }
}

/// Resource limits applied to the child's cgroup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnLimits {
    /// `memory.max` in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// CPU quota as a percentage of one core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<u32>,
    /// `pids.max`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pids: Option<u32>,
}

impl SpawnLimits {
    /// Whether any limit is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.memory_mb.is_some() || self.cpu_percent.is_some() || self.max_pids.is_some()
    }
}

/// The `SYS_SPAWN` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Child name; doubles as the cgroup directory stem.
    pub name: String,
    /// Script path executed via the configured interpreter.
    pub script: String,
    /// Launch inside fresh namespaces and a cgroup.
    #[serde(default = "default_sandboxed")]
    pub sandboxed: bool,
    /// Whether the child keeps network access (sandboxed spawns only).
    #[serde(default)]
    pub network: bool,
    /// Resource limits.
    #[serde(default)]
    pub limits: SpawnLimits,
    /// Restart policy.
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    /// Restart attempts before escalation.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Window in seconds; an incarnation outliving it resets the attempt
    /// counter.
    #[serde(default = "default_restart_window")]
    pub restart_window: u64,
}
