//! Replay progress tracking.
//!
//! The kernel's replay task walks an exported recording and re-issues each
//! request through the normal dispatcher; this module only owns the shared
//! progress state that `SYS_REPLAY_STATUS` reports.

use clove_core::{SyscallError, SyscallResult};
use serde::Serialize;
use std::sync::RwLock;

/// Replay lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayState {
    /// No replay has run.
    #[serde(rename = "IDLE")]
    Idle,
    /// A replay task is walking the recording.
    #[serde(rename = "REPLAYING")]
    Replaying,
    /// The last replay finished.
    #[serde(rename = "DONE")]
    Done,
    /// The last replay aborted.
    #[serde(rename = "FAILED")]
    Failed,
}

/// Progress snapshot returned by `SYS_REPLAY_STATUS`.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStatus {
    /// Lifecycle state.
    pub state: ReplayState,
    /// Index of the entry currently being replayed.
    pub current_entry: u64,
    /// Total entries in the recording.
    pub total_entries: u64,
    /// Entries re-issued so far.
    pub entries_replayed: u64,
    /// Non-deterministic entries skipped so far.
    pub entries_skipped: u64,
    /// Failure message, if the replay aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ReplayStatus {
    fn default() -> Self {
        Self {
            state: ReplayState::Idle,
            current_entry: 0,
            total_entries: 0,
            entries_replayed: 0,
            entries_skipped: 0,
            error: None,
        }
    }
}

/// Shared replay progress, updated by the replay task.
#[derive(Debug, Default)]
pub struct ReplayTracker {
    status: RwLock<ReplayStatus>,
}

impl ReplayTracker {
    /// Create an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a replay of `total_entries` entries.
    ///
    /// # Errors
    ///
    /// `Conflict` if a replay is already in progress.
    pub fn begin(&self, total_entries: u64) -> SyscallResult<()> {
        let mut status = self.status.write().expect("replay tracker lock poisoned");
        if status.state == ReplayState::Replaying {
            return Err(SyscallError::Conflict("replay already in progress".to_string()));
        }
        *status = ReplayStatus {
            state: ReplayState::Replaying,
            total_entries,
            ..ReplayStatus::default()
        };
        Ok(())
    }

    /// Record progress past one entry.
    pub fn advance(&self, entry_index: u64, skipped: bool) {
        let mut status = self.status.write().expect("replay tracker lock poisoned");
        status.current_entry = entry_index;
        if skipped {
            status.entries_skipped = status.entries_skipped.saturating_add(1);
        } else {
            status.entries_replayed = status.entries_replayed.saturating_add(1);
        }
    }

    /// Mark the replay complete.
    pub fn finish(&self) {
        let mut status = self.status.write().expect("replay tracker lock poisoned");
        status.state = ReplayState::Done;
    }

    /// Mark the replay failed.
    pub fn fail(&self, error: impl Into<String>) {
        let mut status = self.status.write().expect("replay tracker lock poisoned");
        status.state = ReplayState::Failed;
        status.error = Some(error.into());
    }

    /// Current progress snapshot.
    #[must_use]
    pub fn status(&self) -> ReplayStatus {
        self.status
            .read()
            .expect("replay tracker lock poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let tracker = ReplayTracker::new();
        assert_eq!(tracker.status().state, ReplayState::Idle);

        tracker.begin(3).unwrap();
        assert!(matches!(tracker.begin(1), Err(SyscallError::Conflict(_))));

        tracker.advance(0, false);
        tracker.advance(1, true);
        tracker.advance(2, false);
        tracker.finish();

        let status = tracker.status();
        assert_eq!(status.state, ReplayState::Done);
        assert_eq!(status.entries_replayed, 2);
        assert_eq!(status.entries_skipped, 1);
        assert_eq!(status.total_entries, 3);
    }

    #[test]
    fn test_begin_resets_counters() {
        let tracker = ReplayTracker::new();
        tracker.begin(2).unwrap();
        tracker.advance(0, false);
        tracker.fail("worker gone");
        assert_eq!(tracker.status().state, ReplayState::Failed);

        tracker.begin(5).unwrap();
        let status = tracker.status();
        assert_eq!(status.entries_replayed, 0);
        assert_eq!(status.total_entries, 5);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_state_wire_names() {
        let v = serde_json::to_value(ReplayState::Replaying).unwrap();
        assert_eq!(v, "REPLAYING");
    }
}
