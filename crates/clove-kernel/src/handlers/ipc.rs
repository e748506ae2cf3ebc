//! `SYS_SEND` / `SYS_RECV` / `SYS_BROADCAST` / `SYS_REGISTER`.

use clove_audit::AuditCategory;
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::{BroadcastRequest, RecvRequest, RegisterRequest, SendRequest};
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) fn register(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: RegisterRequest = parse(request)?;
    kernel.ipc.register(agent, &req.name)?;
    kernel.audit.record(
        AuditCategory::Ipc,
        "SYS_REGISTER",
        Some(agent.0),
        json!({"name": &req.name}),
    );
    Ok(json!({
        "success": true,
        "agent_id": agent.0,
        "name": req.name,
    }))
}

pub(crate) fn send(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: SendRequest = parse(request)?;
    // Addressing: an explicit id reaches any live session; a name must
    // resolve through the registry.
    let to = match (req.to, req.to_name.as_deref()) {
        (Some(id), _) => AgentId(id),
        (None, Some(name)) => kernel
            .ipc
            .resolve(name)
            .ok_or_else(|| SyscallError::not_found("unknown recipient"))?,
        (None, None) => return Err(SyscallError::not_found("unknown recipient")),
    };

    kernel.ipc.send(agent, to, req.message)?;
    kernel.audit.record(
        AuditCategory::Ipc,
        "SYS_SEND",
        Some(agent.0),
        json!({"to": to.0}),
    );
    Ok(json!({"success": true, "delivered_to": to.0}))
}

pub(crate) fn recv(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: RecvRequest = parse(request)?;
    let messages = kernel.ipc.recv(agent, req.max);
    Ok(json!({
        "success": true,
        "count": messages.len(),
        "messages": messages,
    }))
}

pub(crate) fn broadcast(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: BroadcastRequest = parse(request)?;
    let outcome = kernel.ipc.broadcast(agent, &req.message, req.include_self);
    kernel.audit.record(
        AuditCategory::Ipc,
        "SYS_BROADCAST",
        Some(agent.0),
        json!({"delivered": outcome.delivered, "skipped_full": outcome.skipped_full}),
    );
    if outcome.skipped_full > 0 {
        kernel.audit.record(
            AuditCategory::Resource,
            "BROADCAST_MAILBOX_FULL",
            Some(agent.0),
            json!({"skipped": outcome.skipped_full}),
        );
    }
    Ok(json!({
        "success": true,
        "delivered_count": outcome.delivered,
    }))
}
