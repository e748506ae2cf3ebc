//! The syscall dispatcher: opcode routing plus the audit and recorder taps.

use clove_audit::AuditCategory;
use clove_core::{AgentId, SyscallError};
use clove_events::{KernelEvent, types};
use clove_protocol::Opcode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

use crate::gate;
use crate::handlers;
use crate::kernel::Kernel;

/// Dispatch one frame. Always produces a response payload; protocol-level
/// failures become `{success:false, error}` bodies and the session stays up.
pub(crate) async fn dispatch_frame(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    raw_opcode: u8,
    payload: &[u8],
) -> Vec<u8> {
    let Some(op) = Opcode::from_u8(raw_opcode) else {
        return SyscallError::bad_request("unknown opcode")
            .to_payload()
            .to_string()
            .into_bytes();
    };

    let started = Instant::now();

    // NOOP is the one opaque-payload opcode: echo the bytes untouched.
    if op == Opcode::Noop {
        kernel.audit.record(
            AuditCategory::Syscall,
            op.name(),
            Some(agent.0),
            json!({"bytes": payload.len()}),
        );
        return payload.to_vec();
    }

    let request: Value = if payload.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                return SyscallError::from(e).to_payload().to_string().into_bytes();
            },
        }
    };

    let caps = kernel.caps_of(agent);
    let result = match gate::check(&caps, op) {
        Ok(()) => handlers::handle(kernel, agent, op, &request, &caps).await,
        Err(denied) => Err(denied),
    };

    let response = match result {
        Ok(value) => value,
        Err(error) => {
            if error.is_denial() {
                kernel.audit.record(
                    AuditCategory::Security,
                    types::PERMISSION_DENIED,
                    Some(agent.0),
                    json!({"opcode": op.name()}),
                );
                kernel.events.publish(&KernelEvent::new(
                    types::PERMISSION_DENIED,
                    json!({"agent_id": agent.0, "opcode": op.name()}),
                ));
            }
            error.to_payload()
        },
    };

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    trace!(agent = %agent, opcode = op.name(), duration_ms, "Dispatched");

    kernel.audit.record(
        AuditCategory::Syscall,
        op.name(),
        Some(agent.0),
        json!({"duration_ms": duration_ms}),
    );
    kernel
        .recorder
        .record(agent.0, op, request, response.clone(), duration_ms);

    response.to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;

    fn test_kernel() -> Arc<Kernel> {
        let dir = std::env::temp_dir().join("clove-dispatch-tests");
        Kernel::new(KernelConfig {
            socket_path: dir.join("clove.sock"),
            working_area: dir,
            ..KernelConfig::default()
        })
    }

    async fn call(kernel: &Arc<Kernel>, agent: AgentId, opcode: u8, body: Value) -> Value {
        let bytes = dispatch_frame(kernel, agent, opcode, body.to_string().as_bytes()).await;
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_noop_echoes_raw_bytes() {
        let kernel = test_kernel();
        let agent = kernel.open_session();
        let out = dispatch_frame(&kernel, agent, 0x00, b"\x00\x01binary\xff").await;
        assert_eq!(out, b"\x00\x01binary\xff");
    }

    #[tokio::test]
    async fn test_unknown_opcode_is_reported() {
        let kernel = test_kernel();
        let agent = kernel.open_session();
        let response = call(&kernel, agent, 0x75, serde_json::json!({})).await;
        assert_eq!(response["success"], false);
        assert_eq!(response["error"], "unknown opcode");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let kernel = test_kernel();
        let agent = kernel.open_session();
        let out = dispatch_frame(&kernel, agent, 0x30, b"{not json").await;
        let response: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(response["success"], false);
        assert!(
            response["error"]
                .as_str()
                .unwrap()
                .starts_with("malformed payload")
        );
    }

    #[tokio::test]
    async fn test_world_scoped_store() {
        let kernel = test_kernel();
        let agent = kernel.open_session();

        // World scope without membership is refused.
        let response = call(
            &kernel,
            agent,
            0x30,
            serde_json::json!({"key": "k", "value": 1, "scope": "world"}),
        )
        .await;
        assert_eq!(response["success"], false);

        let response = call(
            &kernel,
            agent,
            0xA0,
            serde_json::json!({"name": "shared", "config": {}}),
        )
        .await;
        let world_id = response["world_id"].as_str().unwrap().to_string();
        call(&kernel, agent, 0xA3, serde_json::json!({"world_id": &world_id})).await;

        let response = call(
            &kernel,
            agent,
            0x30,
            serde_json::json!({"key": "k", "value": {"shared": true}, "scope": "world"}),
        )
        .await;
        assert_eq!(response["success"], true);

        // Another member of the same world sees the record.
        let peer = kernel.open_session();
        call(&kernel, peer, 0xA3, serde_json::json!({"world_id": &world_id})).await;
        let response = call(&kernel, peer, 0x31, serde_json::json!({"key": "k"})).await;
        assert_eq!(response["exists"], true);
        assert_eq!(response["value"]["shared"], true);

        // A session outside the world does not.
        let outsider = kernel.open_session();
        let response = call(&kernel, outsider, 0x31, serde_json::json!({"key": "k"})).await;
        assert_eq!(response["exists"], false);
    }

    #[tokio::test]
    async fn test_denial_emits_security_audit_and_event() {
        let kernel = test_kernel();
        let watcher = kernel.open_session();
        call(
            &kernel,
            watcher,
            0x60,
            serde_json::json!({"event_types": ["PERMISSION_DENIED"]}),
        )
        .await;

        let agent = kernel.open_session();
        let response = call(
            &kernel,
            agent,
            0x10,
            serde_json::json!({"name": "x", "script": "/tmp/x.sh"}),
        )
        .await;
        assert_eq!(response["error"], "permission denied");

        let entries = kernel
            .audit
            .query(0, Some(AuditCategory::Security), Some(agent.0), 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "PERMISSION_DENIED");

        let response = call(&kernel, watcher, 0x62, serde_json::json!({"max": 10})).await;
        assert_eq!(response["count"], 1);
        assert_eq!(response["events"][0]["data"]["opcode"], "SYS_SPAWN");
    }

    #[tokio::test]
    async fn test_recorder_tap_sees_request_and_response() {
        let kernel = test_kernel();
        let agent = kernel.open_session();
        kernel
            .recorder
            .start(clove_audit::RecorderOptions::default())
            .unwrap();

        call(
            &kernel,
            agent,
            0x30,
            serde_json::json!({"key": "taped", "value": 9, "scope": "global"}),
        )
        .await;
        kernel.recorder.stop();

        let exported = kernel.recorder.export();
        let entries = exported.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["opcode_name"], "SYS_STORE");
        assert_eq!(entries[0]["request_payload"]["key"], "taped");
        assert_eq!(entries[0]["response_payload"]["success"], true);
    }
}
