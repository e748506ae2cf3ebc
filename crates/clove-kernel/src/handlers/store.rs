//! `SYS_STORE` / `SYS_FETCH` / `SYS_DELETE` / `SYS_KEYS`.

use clove_audit::AuditCategory;
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::{KeyRequest, KeysRequest, StoreRequest};
use clove_store::{Owner, Scope};
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

/// Resolve the wire scope string to a concrete record owner.
fn owner_for(kernel: &Kernel, agent: AgentId, scope: &str) -> SyscallResult<Owner> {
    match Scope::parse(scope) {
        Some(Scope::Global) => Ok(Owner::Global),
        Some(Scope::Agent) => Ok(Owner::Agent(agent)),
        Some(Scope::World) => kernel
            .worlds
            .world_of(agent)
            .map(Owner::World)
            .ok_or_else(|| SyscallError::bad_request("not joined to any world")),
        None => Err(SyscallError::bad_request(format!("unknown scope: {scope}"))),
    }
}

pub(crate) fn store(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: StoreRequest = parse(request)?;
    let owner = owner_for(kernel, agent, &req.scope)?;
    kernel.store.store(owner, &req.key, req.value, req.ttl)?;
    kernel.audit.record(
        AuditCategory::State,
        "SYS_STORE",
        Some(agent.0),
        json!({"key": req.key, "scope": req.scope, "ttl": req.ttl}),
    );
    Ok(json!({"success": true}))
}

pub(crate) fn fetch(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: KeyRequest = parse(request)?;
    // Fetch resolves the key through the caller's scopes: agent-local
    // first, then the joined world, then global.
    let mut owners = vec![Owner::Agent(agent)];
    if let Some(world) = kernel.worlds.world_of(agent) {
        owners.push(Owner::World(world));
    }
    owners.push(Owner::Global);

    for owner in owners {
        if let Some(value) = kernel.store.fetch(&owner, &req.key) {
            return Ok(json!({"success": true, "exists": true, "value": value}));
        }
    }
    Ok(json!({"success": true, "exists": false}))
}

pub(crate) fn delete(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: KeyRequest = parse(request)?;
    let mut owners = vec![Owner::Agent(agent)];
    if let Some(world) = kernel.worlds.world_of(agent) {
        owners.push(Owner::World(world));
    }
    owners.push(Owner::Global);

    let deleted = owners.iter().any(|owner| kernel.store.delete(owner, &req.key));
    if deleted {
        kernel.audit.record(
            AuditCategory::State,
            "SYS_DELETE",
            Some(agent.0),
            json!({"key": req.key}),
        );
    }
    Ok(json!({"success": true, "deleted": deleted}))
}

pub(crate) fn keys(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: KeysRequest = parse(request)?;
    // Keys across every scope the caller can see, agent-local first, then
    // world, then global; per-scope insertion order is preserved.
    let mut keys = kernel.store.keys(&Owner::Agent(agent), &req.prefix);
    if let Some(world) = kernel.worlds.world_of(agent) {
        for key in kernel.store.keys(&Owner::World(world), &req.prefix) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    for key in kernel.store.keys(&Owner::Global, &req.prefix) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(json!({"success": true, "keys": keys}))
}
