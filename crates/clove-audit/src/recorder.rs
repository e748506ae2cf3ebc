//! The execution recorder.

use chrono::{DateTime, Utc};
use clove_core::{SyscallError, SyscallResult};
use clove_protocol::Opcode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::debug;

fn default_record_max() -> usize {
    50_000
}

/// Recorder filters, as carried by `SYS_RECORD_START`.
///
/// Non-deterministic opcodes are excluded unless explicitly included;
/// replaying them would not reproduce the original run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderOptions {
    /// Record `SYS_THINK` calls.
    #[serde(default)]
    pub include_think: bool,
    /// Record `SYS_HTTP` calls.
    #[serde(default)]
    pub include_http: bool,
    /// Record `SYS_EXEC` calls.
    #[serde(default)]
    pub include_exec: bool,
    /// Only record these agents; empty records all.
    #[serde(default)]
    pub filter_agents: Vec<u32>,
    /// Buffer capacity; oldest entries fall off.
    #[serde(default = "default_record_max")]
    pub max_entries: usize,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            include_think: false,
            include_http: false,
            include_exec: false,
            filter_agents: Vec::new(),
            max_entries: default_record_max(),
        }
    }
}

impl RecorderOptions {
    /// Whether a syscall by `agent_id` with `opcode` passes the filters.
    #[must_use]
    pub fn accepts(&self, agent_id: u32, opcode: Opcode) -> bool {
        let opcode_ok = match opcode {
            Opcode::Think => self.include_think,
            Opcode::Http => self.include_http,
            Opcode::Exec => self.include_exec,
            // Recording control and introspection would pollute the capture.
            Opcode::RecordStart
            | Opcode::RecordStop
            | Opcode::RecordStatus
            | Opcode::ReplayStart
            | Opcode::ReplayStatus => false,
            _ => true,
        };
        opcode_ok && (self.filter_agents.is_empty() || self.filter_agents.contains(&agent_id))
    }
}

/// One recorded request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingEntry {
    /// Position in the recording, from 0.
    pub seq: u64,
    /// Capture time.
    pub ts: DateTime<Utc>,
    /// Issuing session.
    pub agent_id: u32,
    /// Raw opcode byte.
    pub opcode: u8,
    /// `SYS_*` opcode name.
    pub opcode_name: String,
    /// Request payload as parsed JSON.
    pub request_payload: Value,
    /// Response payload as parsed JSON.
    pub response_payload: Value,
    /// Handler wall time.
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
struct Inner {
    active: bool,
    options: RecorderOptions,
    entries: VecDeque<RecordingEntry>,
    next_seq: u64,
}

/// The kernel-owned execution recorder.
#[derive(Debug, Default)]
pub struct Recorder {
    inner: RwLock<Inner>,
}

impl Recorder {
    /// Create an idle recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin recording with the given filters, clearing any previous buffer.
    ///
    /// # Errors
    ///
    /// `Conflict` if a recording is already active.
    pub fn start(&self, options: RecorderOptions) -> SyscallResult<()> {
        let mut inner = self.inner.write().expect("recorder lock poisoned");
        if inner.active {
            return Err(SyscallError::Conflict("recording already active".to_string()));
        }
        debug!(?options, "Recording started");
        inner.active = true;
        inner.options = options;
        inner.entries.clear();
        inner.next_seq = 0;
        Ok(())
    }

    /// Stop recording. Returns the captured entry count; the buffer is kept
    /// for export.
    pub fn stop(&self) -> usize {
        let mut inner = self.inner.write().expect("recorder lock poisoned");
        inner.active = false;
        debug!(entries = inner.entries.len(), "Recording stopped");
        inner.entries.len()
    }

    /// Whether a recording is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.read().expect("recorder lock poisoned").active
    }

    /// Capture one request/response pair if recording is active and the
    /// filters accept it.
    pub fn record(
        &self,
        agent_id: u32,
        opcode: Opcode,
        request_payload: Value,
        response_payload: Value,
        duration_ms: u64,
    ) {
        let mut inner = self.inner.write().expect("recorder lock poisoned");
        if !inner.active || !inner.options.accepts(agent_id, opcode) {
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq = inner.next_seq.saturating_add(1);
        inner.entries.push_back(RecordingEntry {
            seq,
            ts: Utc::now(),
            agent_id,
            opcode: opcode as u8,
            opcode_name: opcode.name().to_string(),
            request_payload,
            response_payload,
            duration_ms,
        });
        while inner.entries.len() > inner.options.max_entries {
            inner.entries.pop_front();
        }
    }

    /// Number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("recorder lock poisoned").entries.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export the buffer as a JSON array value.
    #[must_use]
    pub fn export(&self) -> Value {
        let inner = self.inner.read().expect("recorder lock poisoned");
        serde_json::to_value(inner.entries.iter().collect::<Vec<_>>())
            .unwrap_or_else(|_| Value::Array(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_conflict() {
        let recorder = Recorder::new();
        recorder.start(RecorderOptions::default()).unwrap();
        assert!(matches!(
            recorder.start(RecorderOptions::default()),
            Err(SyscallError::Conflict(_))
        ));
        recorder.stop();
        recorder.start(RecorderOptions::default()).unwrap();
    }

    #[test]
    fn test_nondeterministic_excluded_by_default() {
        let recorder = Recorder::new();
        recorder.start(RecorderOptions::default()).unwrap();
        recorder.record(1, Opcode::Think, json!({}), json!({}), 5);
        recorder.record(1, Opcode::Exec, json!({}), json!({}), 5);
        recorder.record(1, Opcode::Store, json!({"key": "k"}), json!({"success": true}), 1);
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_include_flags() {
        let recorder = Recorder::new();
        recorder
            .start(RecorderOptions {
                include_exec: true,
                ..RecorderOptions::default()
            })
            .unwrap();
        recorder.record(1, Opcode::Exec, json!({}), json!({}), 5);
        recorder.record(1, Opcode::Http, json!({}), json!({}), 5);
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_agent_filter() {
        let recorder = Recorder::new();
        recorder
            .start(RecorderOptions {
                filter_agents: vec![2],
                ..RecorderOptions::default()
            })
            .unwrap();
        recorder.record(1, Opcode::Store, json!({}), json!({}), 1);
        recorder.record(2, Opcode::Store, json!({}), json!({}), 1);
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_recording_control_never_recorded() {
        let recorder = Recorder::new();
        recorder.start(RecorderOptions::default()).unwrap();
        recorder.record(1, Opcode::RecordStatus, json!({}), json!({}), 1);
        recorder.record(1, Opcode::ReplayStart, json!({}), json!({}), 1);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_export_roundtrips() {
        let recorder = Recorder::new();
        recorder.start(RecorderOptions::default()).unwrap();
        recorder.record(3, Opcode::Send, json!({"to": 1}), json!({"success": true}), 2);
        recorder.stop();

        let exported = recorder.export();
        let entries: Vec<RecordingEntry> = serde_json::from_value(exported).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].opcode_name, "SYS_SEND");
        assert_eq!(entries[0].agent_id, 3);
    }
}
