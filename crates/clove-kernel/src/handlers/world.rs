//! The `SYS_WORLD_*` family.

use clove_audit::AuditCategory;
use clove_core::{AgentId, SyscallResult};
use clove_events::{KernelEvent, types};
use clove_protocol::payload::{
    WorldCreateRequest, WorldDestroyRequest, WorldEventRequest, WorldIdRequest,
    WorldRestoreRequest,
};
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) fn create(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: WorldCreateRequest = parse(request)?;
    let world_id = kernel.worlds.create(&req.name, &req.config)?;
    kernel.audit.record(
        AuditCategory::World,
        types::WORLD_CREATED,
        Some(agent.0),
        json!({"world_id": &world_id, "name": &req.name}),
    );
    kernel.events.publish(&KernelEvent::new(
        types::WORLD_CREATED,
        json!({"world_id": &world_id, "name": &req.name}),
    ));
    Ok(json!({"success": true, "world_id": world_id}))
}

pub(crate) fn destroy(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: WorldDestroyRequest = parse(request)?;
    kernel.worlds.destroy(&req.world_id, req.force)?;
    kernel.audit.record(
        AuditCategory::World,
        types::WORLD_DESTROYED,
        Some(agent.0),
        json!({"world_id": &req.world_id, "force": req.force}),
    );
    kernel.events.publish(&KernelEvent::new(
        types::WORLD_DESTROYED,
        json!({"world_id": req.world_id}),
    ));
    Ok(json!({"success": true}))
}

pub(crate) fn list(kernel: &Arc<Kernel>) -> SyscallResult<Value> {
    let worlds = kernel.worlds.list();
    Ok(json!({
        "success": true,
        "count": worlds.len(),
        "worlds": worlds,
    }))
}

pub(crate) fn join(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: WorldIdRequest = parse(request)?;
    let world_id = kernel.worlds.join(agent, &req.world_id)?;
    kernel.audit.record(
        AuditCategory::World,
        "WORLD_JOINED",
        Some(agent.0),
        json!({"world_id": &world_id}),
    );
    Ok(json!({"success": true, "world_id": world_id}))
}

pub(crate) fn leave(kernel: &Arc<Kernel>, agent: AgentId) -> SyscallResult<Value> {
    let world_id = kernel.worlds.leave(agent)?;
    kernel.audit.record(
        AuditCategory::World,
        "WORLD_LEFT",
        Some(agent.0),
        json!({"world_id": &world_id}),
    );
    Ok(json!({"success": true, "world_id": world_id}))
}

pub(crate) fn event(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: WorldEventRequest = parse(request)?;
    kernel.worlds.inject(&req.world_id, &req.event_type)?;
    kernel.audit.record(
        AuditCategory::World,
        "WORLD_CHAOS_EVENT",
        Some(agent.0),
        json!({"world_id": req.world_id, "event_type": req.event_type}),
    );
    Ok(json!({"success": true}))
}

pub(crate) fn state(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: WorldIdRequest = parse(request)?;
    let state = kernel.worlds.state(&req.world_id)?;
    Ok(json!({"success": true, "state": state}))
}

pub(crate) fn snapshot(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: WorldIdRequest = parse(request)?;
    let snapshot = kernel.worlds.snapshot(&req.world_id)?;
    Ok(json!({"success": true, "snapshot": snapshot}))
}

pub(crate) fn restore(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: WorldRestoreRequest = parse(request)?;
    let world_id = kernel.worlds.restore(&req.snapshot, &req.new_world_id)?;
    Ok(json!({"success": true, "world_id": world_id}))
}
