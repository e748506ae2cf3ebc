//! The `SYS_METRICS_*` family.

use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::{MetricsAgentRequest, MetricsCgroupRequest};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) async fn system(kernel: &Arc<Kernel>) -> SyscallResult<Value> {
    let snapshot = kernel.metrics.system(kernel.llm.queue_depth()).await?;
    Ok(json!({"success": true, "metrics": snapshot}))
}

pub(crate) async fn agent(
    kernel: &Arc<Kernel>,
    caller: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: MetricsAgentRequest = parse(request)?;
    let target = req.agent_id.map_or(caller, AgentId);
    let pid = kernel
        .supervisor
        .pid_of(target)
        .ok_or_else(|| SyscallError::not_found(format!("no process for agent {target}")))?;
    let snapshot = kernel.metrics.agent(target.0, pid).await?;
    Ok(json!({"success": true, "metrics": snapshot}))
}

pub(crate) async fn all_agents(kernel: &Arc<Kernel>) -> SyscallResult<Value> {
    let mut agents = Vec::new();
    for info in kernel.supervisor.list() {
        if info.state != "RUNNING" && info.state != "PAUSED" {
            continue;
        }
        match kernel.metrics.agent(info.id, info.pid).await {
            Ok(snapshot) => agents.push(snapshot),
            // A child can exit between listing and sampling.
            Err(SyscallError::NotFound(_)) => {},
            Err(e) => return Err(e),
        }
    }
    Ok(json!({
        "success": true,
        "count": agents.len(),
        "agents": agents,
    }))
}

pub(crate) async fn cgroup(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: MetricsCgroupRequest = parse(request)?;
    let path = req
        .cgroup_path
        .map_or_else(|| kernel.default_cgroup_root(), PathBuf::from);
    let snapshot = kernel.metrics.cgroup(&path).await?;
    Ok(json!({"success": true, "metrics": snapshot}))
}
