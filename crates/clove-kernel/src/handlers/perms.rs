//! `SYS_GET_PERMS` / `SYS_SET_PERMS`.

use clove_audit::AuditCategory;
use clove_caps::{Capabilities, PermissionLevel};
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::SetPermsRequest;
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) fn get(caps: &Capabilities) -> SyscallResult<Value> {
    Ok(json!({"success": true, "permissions": caps}))
}

pub(crate) fn set(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    let req: SetPermsRequest = parse(request)?;
    let target = req.agent_id.map_or(agent, AgentId);

    let new_caps = match (&req.level, &req.permissions) {
        (Some(level_name), _) => {
            let level = PermissionLevel::parse(level_name).ok_or_else(|| {
                SyscallError::bad_request(format!("unknown permission level: {level_name}"))
            })?;
            Capabilities::from_level(level, &kernel.working_area())
        },
        (None, Some(explicit)) => serde_json::from_value(explicit.clone())
            .map_err(|e| SyscallError::bad_request(format!("bad permissions object: {e}")))?,
        (None, None) => {
            return Err(SyscallError::bad_request("level or permissions required"));
        },
    };

    if target != agent {
        // Changing someone else needs the capability, and only an
        // unrestricted caller may upgrade them.
        if !caps.can_set_perms {
            return Err(SyscallError::PermissionDenied);
        }
        let target_caps = kernel.caps_of(target);
        let upgrading = new_caps.level.rank() > target_caps.level.rank();
        if upgrading && caps.level != PermissionLevel::Unrestricted {
            return Err(SyscallError::PermissionDenied);
        }
        if !kernel.has_session(target) {
            return Err(SyscallError::not_found(format!("unknown agent: {target}")));
        }
    }

    let level = new_caps.level;
    if !kernel.set_caps(target, new_caps) {
        return Err(SyscallError::not_found(format!("unknown agent: {target}")));
    }

    kernel.audit.record(
        AuditCategory::Security,
        "PERMISSIONS_CHANGED",
        Some(agent.0),
        json!({"target": target.0, "level": level.as_str()}),
    );
    Ok(json!({"success": true}))
}
