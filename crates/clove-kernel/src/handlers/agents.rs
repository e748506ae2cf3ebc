//! `SYS_SPAWN` / `SYS_KILL` / `SYS_LIST` / `SYS_PAUSE` / `SYS_RESUME`.

use clove_caps::Capabilities;
use clove_core::{SyscallError, SyscallResult};
use clove_protocol::payload::AgentTarget;
use clove_supervisor::SpawnSpec;
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) fn spawn(
    kernel: &Arc<Kernel>,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    if !caps.can_spawn {
        return Err(SyscallError::PermissionDenied);
    }
    let mut spec: SpawnSpec = parse(request)?;
    // The session's configured limits fill in anything the spec leaves unset.
    if spec.limits.memory_mb.is_none() {
        spec.limits.memory_mb = caps.limits.memory_mb;
    }
    if spec.limits.cpu_percent.is_none() {
        spec.limits.cpu_percent = caps.limits.cpu_percent;
    }
    if spec.limits.max_pids.is_none() {
        spec.limits.max_pids = caps.limits.max_pids;
    }

    let child_id = kernel.allocate_agent_id();
    kernel.supervisor.spawn(child_id, spec)
}

pub(crate) async fn kill(
    kernel: &Arc<Kernel>,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    if !caps.can_spawn {
        return Err(SyscallError::PermissionDenied);
    }
    let target: AgentTarget = parse(request)?;
    let killed = kernel
        .supervisor
        .kill(target.id, target.name.as_deref())
        .await?;
    Ok(json!({"success": true, "killed": killed}))
}

pub(crate) fn list(kernel: &Arc<Kernel>) -> SyscallResult<Value> {
    // The one syscall whose response body is a bare array.
    Ok(serde_json::to_value(kernel.supervisor.list())?)
}

pub(crate) fn pause(
    kernel: &Arc<Kernel>,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    if !caps.can_spawn {
        return Err(SyscallError::PermissionDenied);
    }
    let target: AgentTarget = parse(request)?;
    kernel.supervisor.pause(target.id, target.name.as_deref())?;
    Ok(json!({"success": true}))
}

pub(crate) fn resume(
    kernel: &Arc<Kernel>,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    if !caps.can_spawn {
        return Err(SyscallError::PermissionDenied);
    }
    let target: AgentTarget = parse(request)?;
    kernel.supervisor.resume(target.id, target.name.as_deref())?;
    Ok(json!({"success": true}))
}
