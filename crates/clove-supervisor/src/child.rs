//! Per-child state shared between the supervisor and monitor tasks.

use chrono::{DateTime, Utc};
use clove_core::AgentId;
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use crate::cgroup::CgroupScope;
use crate::spec::SpawnSpec;

/// Lifecycle state of a child agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Process is alive.
    Running,
    /// SIGSTOP delivered, awaiting SIGCONT.
    Paused,
    /// Stopped on request; exit is final.
    Stopped,
    /// Process exited with a code; restart policy pending or final.
    Exited(i32),
    /// Waiting out the restart backoff.
    RestartWait,
    /// Restart budget exhausted; operator attention required.
    Escalated,
}

impl AgentState {
    /// Wire name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Exited(_) => "EXITED",
            Self::RestartWait => "RESTART_WAIT",
            Self::Escalated => "ESCALATED",
        }
    }

    /// Whether no further transitions can happen.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Stopped | Self::Escalated)
    }
}

/// One row of `SYS_LIST` output.
#[derive(Debug, Clone, Serialize)]
pub struct ChildInfo {
    /// Child agent id.
    pub id: u32,
    /// Child name.
    pub name: String,
    /// Current (or last) pid.
    pub pid: u32,
    /// State wire name.
    pub state: String,
    /// Milliseconds since the current incarnation started.
    pub uptime_ms: u64,
    /// Completed restarts.
    pub restart_count: u32,
    /// Restart policy wire name.
    pub restart_policy: String,
    /// Whether the child runs inside namespaces + cgroup.
    pub sandboxed: bool,
    /// When the child was first spawned.
    pub spawned_at: DateTime<Utc>,
}

/// Shared, lock-protected record for one supervised child.
#[derive(Debug)]
pub(crate) struct ChildRecord {
    pub(crate) id: AgentId,
    pub(crate) spec: SpawnSpec,
    pub(crate) pid: AtomicU32,
    pub(crate) state: Mutex<AgentState>,
    pub(crate) restart_count: AtomicU32,
    pub(crate) incarnation_started: Mutex<Instant>,
    pub(crate) spawned_at: DateTime<Utc>,
    pub(crate) cgroup: Option<CgroupScope>,
}

impl ChildRecord {
    pub(crate) fn new(
        id: AgentId,
        spec: SpawnSpec,
        pid: u32,
        cgroup: Option<CgroupScope>,
    ) -> Self {
        Self {
            id,
            spec,
            pid: AtomicU32::new(pid),
            state: Mutex::new(AgentState::Running),
            restart_count: AtomicU32::new(0),
            incarnation_started: Mutex::new(Instant::now()),
            spawned_at: Utc::now(),
            cgroup,
        }
    }

    pub(crate) fn state(&self) -> AgentState {
        *self.state.lock().expect("child state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: AgentState) {
        *self.state.lock().expect("child state lock poisoned") = state;
    }

    /// Swap state only if the current state matches `from`. Returns whether
    /// the swap happened.
    pub(crate) fn transition(&self, from: AgentState, to: AgentState) -> bool {
        let mut state = self.state.lock().expect("child state lock poisoned");
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    pub(crate) fn info(&self) -> ChildInfo {
        let state = self.state();
        let uptime_ms = match state {
            AgentState::Running | AgentState::Paused => u64::try_from(
                self.incarnation_started
                    .lock()
                    .expect("child clock lock poisoned")
                    .elapsed()
                    .as_millis(),
            )
            .unwrap_or(u64::MAX),
            _ => 0,
        };
        ChildInfo {
            id: self.id.0,
            name: self.spec.name.clone(),
            pid: self.pid.load(Ordering::Relaxed),
            state: state.as_str().to_string(),
            uptime_ms,
            restart_count: self.restart_count.load(Ordering::Relaxed),
            restart_policy: self.spec.restart_policy.as_str().to_string(),
            sandboxed: self.spec.sandboxed,
            spawned_at: self.spawned_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{RestartPolicy, SpawnLimits};

    fn record() -> ChildRecord {
        ChildRecord::new(
            AgentId(4),
            SpawnSpec {
                name: "worker".to_string(),
                script: "/tmp/worker.sh".to_string(),
                sandboxed: false,
                network: false,
                limits: SpawnLimits::default(),
                restart_policy: RestartPolicy::OnFailure,
                max_restarts: 3,
                restart_window: 60,
            },
            1234,
            None,
        )
    }

    #[test]
    fn test_transition_guards_state() {
        let child = record();
        assert!(child.transition(AgentState::Running, AgentState::Paused));
        assert!(!child.transition(AgentState::Running, AgentState::Stopped));
        assert_eq!(child.state(), AgentState::Paused);
    }

    #[test]
    fn test_info_shape() {
        let child = record();
        let info = child.info();
        assert_eq!(info.id, 4);
        assert_eq!(info.state, "RUNNING");
        assert_eq!(info.restart_policy, "on-failure");
        child.set_state(AgentState::Exited(2));
        assert_eq!(child.info().state, "EXITED");
        assert_eq!(child.info().uptime_ms, 0);
    }

    #[test]
    fn test_final_states() {
        assert!(AgentState::Stopped.is_final());
        assert!(AgentState::Escalated.is_final());
        assert!(!AgentState::Exited(1).is_final());
    }
}
