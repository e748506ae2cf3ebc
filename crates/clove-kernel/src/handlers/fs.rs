//! `SYS_READ` / `SYS_WRITE`.
//!
//! World-joined sessions go through the world VFS; everyone else hits the
//! host filesystem behind the session's path whitelists.

use clove_audit::AuditCategory;
use clove_caps::Capabilities;
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::{ReadRequest, WriteMode, WriteRequest};
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) async fn read(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    let req: ReadRequest = parse(request)?;

    // World overlay first; `Some(None)` means "joined, but the world does
    // not virtualize files", which falls through to the host.
    if let Some(overlaid) = kernel
        .worlds
        .with_member_world(agent, |world| world.read_file(&req.path))
        .flatten()
    {
        let content = overlaid?;
        return Ok(json!({
            "success": true,
            "size": content.len(),
            "content": content,
        }));
    }

    if !caps.allows_read(&req.path) {
        return Err(SyscallError::PermissionDenied);
    }

    let metadata = tokio::fs::metadata(&req.path)
        .await
        .map_err(|_| SyscallError::not_found(format!("no such file: {}", req.path)))?;
    if metadata.len() > kernel.config.read_cap_bytes {
        return Err(SyscallError::ResourceExhausted("file too large".to_string()));
    }

    let bytes = tokio::fs::read(&req.path)
        .await
        .map_err(|e| SyscallError::Internal(format!("read failed: {e}")))?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    kernel.audit.record(
        AuditCategory::Resource,
        "SYS_READ",
        Some(agent.0),
        json!({"path": req.path, "size": bytes.len()}),
    );
    Ok(json!({
        "success": true,
        "size": bytes.len(),
        "content": content,
    }))
}

pub(crate) async fn write(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    let req: WriteRequest = parse(request)?;
    let append = req.mode == WriteMode::Append;

    if let Some(overlaid) = kernel
        .worlds
        .with_member_world(agent, |world| world.write_file(&req.path, &req.content, append))
        .flatten()
    {
        let bytes_written = overlaid?;
        return Ok(json!({"success": true, "bytes_written": bytes_written}));
    }

    if !caps.allows_write(&req.path) {
        return Err(SyscallError::PermissionDenied);
    }

    // Parent directories must already exist; callers use `exec mkdir -p`.
    let result = if append {
        use tokio::io::AsyncWriteExt;
        match tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&req.path)
            .await
        {
            Ok(mut file) => file.write_all(req.content.as_bytes()).await,
            Err(e) => Err(e),
        }
    } else {
        tokio::fs::write(&req.path, req.content.as_bytes()).await
    };
    result.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            SyscallError::not_found(format!("no such directory for: {}", req.path))
        },
        _ => SyscallError::Internal(format!("write failed: {e}")),
    })?;

    kernel.audit.record(
        AuditCategory::Resource,
        "SYS_WRITE",
        Some(agent.0),
        json!({"path": req.path, "bytes": req.content.len(), "append": append}),
    );
    Ok(json!({"success": true, "bytes_written": req.content.len()}))
}
