//! `SYS_EXEC`.

use clove_audit::AuditCategory;
use clove_caps::Capabilities;
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::ExecRequest;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::parse;
use crate::kernel::Kernel;

pub(crate) async fn run(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    let req: ExecRequest = parse(request)?;
    if !caps.allows_exec(&req.command) {
        return Err(SyscallError::PermissionDenied);
    }

    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c")
        .arg(&req.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the future on timeout must take the process with it.
        .kill_on_drop(true);
    if let Some(cwd) = &req.cwd {
        cmd.current_dir(cwd);
    }

    let child = cmd
        .spawn()
        .map_err(|e| SyscallError::Internal(format!("exec spawn failed: {e}")))?;

    let deadline = Duration::from_secs(req.timeout.max(1));
    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(SyscallError::Internal(format!("exec wait failed: {e}")));
        },
        Err(_) => {
            kernel.audit.record(
                AuditCategory::Resource,
                "SYS_EXEC_TIMEOUT",
                Some(agent.0),
                json!({"command": req.command, "timeout_s": req.timeout}),
            );
            return Err(SyscallError::Timeout(format!(
                "command timed out after {}s",
                req.timeout
            )));
        },
    };

    let cap = kernel.config.exec_output_cap;
    let stdout = truncate_lossy(&output.stdout, cap);
    // Whatever budget stdout left over goes to stderr.
    let stderr = truncate_lossy(&output.stderr, cap.saturating_sub(stdout.len()));
    let exit_code = output.status.code().unwrap_or(-1);

    kernel.audit.record(
        AuditCategory::Resource,
        "SYS_EXEC",
        Some(agent.0),
        json!({"command": req.command, "exit_code": exit_code}),
    );
    Ok(json!({
        "success": exit_code == 0,
        "stdout": stdout,
        "stderr": stderr,
        "exit_code": exit_code,
    }))
}

fn truncate_lossy(bytes: &[u8], cap: usize) -> String {
    let slice = if bytes.len() > cap { &bytes[..cap] } else { bytes };
    String::from_utf8_lossy(slice).into_owned()
}
