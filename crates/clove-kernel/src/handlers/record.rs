//! Audit queries, audit config, recording control and the replay driver.

use clove_audit::{AuditCategory, AuditConfigPatch, RecorderOptions, RecordingEntry};
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::{GetAuditLogRequest, RecordStatusRequest, ReplayStartRequest};
use clove_protocol::Opcode;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::parse;
use crate::dispatch;
use crate::kernel::Kernel;

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

pub(crate) fn get_audit_log(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: GetAuditLogRequest = parse(request)?;
    let category = match req.category.as_deref() {
        Some(raw) => Some(
            AuditCategory::parse(raw)
                .ok_or_else(|| SyscallError::bad_request(format!("unknown category: {raw}")))?,
        ),
        None => None,
    };
    let entries = kernel
        .audit
        .query(req.since_id, category, req.agent_id, req.limit);
    Ok(json!({
        "success": true,
        "count": entries.len(),
        "entries": entries,
    }))
}

pub(crate) fn set_audit_config(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let patch: AuditConfigPatch = parse(request)?;
    let config = kernel.audit.apply(&patch);
    Ok(json!({"success": true, "config": config}))
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

pub(crate) fn start(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let options: RecorderOptions = parse(request)?;
    kernel.recorder.start(options)?;
    Ok(json!({"success": true}))
}

pub(crate) fn stop(kernel: &Arc<Kernel>) -> SyscallResult<Value> {
    let entry_count = kernel.recorder.stop();
    Ok(json!({"success": true, "entry_count": entry_count}))
}

pub(crate) fn status(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: RecordStatusRequest = parse(request)?;
    let mut response = json!({
        "success": true,
        "recording": kernel.recorder.is_active(),
        "entry_count": kernel.recorder.len(),
    });
    if req.export
        && let Value::Object(map) = &mut response
    {
        map.insert(
            "recording_data".to_string(),
            Value::String(kernel.recorder.export().to_string()),
        );
    }
    Ok(response)
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

pub(crate) fn replay_start(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: ReplayStartRequest = parse(request)?;
    let entries: Vec<RecordingEntry> = serde_json::from_str(&req.recording)
        .map_err(|e| SyscallError::bad_request(format!("bad recording: {e}")))?;

    let total = entries.len() as u64;
    kernel.replay.begin(total)?;
    tokio::spawn(run_replay(Arc::clone(kernel), entries));
    Ok(json!({"success": true, "total_entries": total}))
}

pub(crate) fn replay_status(kernel: &Arc<Kernel>) -> SyscallResult<Value> {
    let status = kernel.replay.status();
    let mut response = serde_json::to_value(&status)?;
    if let Value::Object(map) = &mut response {
        map.insert("success".to_string(), Value::Bool(true));
    }
    Ok(response)
}

/// Walk a recording, re-issuing each deterministic request through the
/// normal dispatcher under the recorded agent id.
async fn run_replay(kernel: Arc<Kernel>, entries: Vec<RecordingEntry>) {
    debug!(total = entries.len(), "Replay started");
    for (index, entry) in entries.iter().enumerate() {
        let index = index as u64;
        let op = Opcode::from_u8(entry.opcode);

        // Non-deterministic opcodes are never re-issued: their original
        // effects happened against an outside world we cannot rewind.
        let skip = op.is_none_or(Opcode::is_nondeterministic);
        if skip {
            kernel.replay.advance(index, true);
            continue;
        }

        // Recordings reference sessions that no longer exist; give each
        // recorded agent id a fresh session shell to replay under.
        if !kernel.has_session(AgentId(entry.agent_id)) {
            kernel.attach_session(AgentId(entry.agent_id));
        }

        let payload = match serde_json::to_vec(&entry.request_payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(seq = entry.seq, error = %e, "Unserializable replay entry");
                kernel.replay.fail(format!("entry {} unserializable: {e}", entry.seq));
                return;
            },
        };
        let _ = dispatch::dispatch_frame(
            &kernel,
            AgentId(entry.agent_id),
            entry.opcode,
            &payload,
        )
        .await;
        kernel.replay.advance(index, false);
    }
    kernel.replay.finish();
    debug!("Replay finished");
}
