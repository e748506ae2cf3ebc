//! `SYS_HTTP`.

use clove_audit::AuditCategory;
use clove_caps::Capabilities;
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::payload::HttpRequest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use super::parse;
use crate::kernel::Kernel;

pub(crate) async fn request(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    let req: HttpRequest = parse(request)?;
    let method = req.method.to_uppercase();

    if !caps.allows_http(&req.url, &method) {
        return Err(SyscallError::PermissionDenied);
    }

    // World network overlay: a mock match answers without touching the
    // network; `fail_unmatched` worlds refuse instead of passing through.
    if let Some(overlaid) = kernel
        .worlds
        .with_member_world(agent, |world| world.resolve_http(&req.url))
        .flatten()
    {
        let mock = overlaid?;
        if mock.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(mock.latency_ms)).await;
        }
        kernel.audit.record(
            AuditCategory::Network,
            "SYS_HTTP",
            Some(agent.0),
            json!({"url": req.url, "method": method, "mocked": true}),
        );
        return Ok(json!({
            "success": mock.status < 400,
            "status_code": mock.status,
            "body": mock.body,
            "mocked": true,
        }));
    }

    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| SyscallError::bad_request(format!("bad http method: {}", req.method)))?;
    let mut builder = kernel
        .http
        .request(method.clone(), &req.url)
        .timeout(Duration::from_secs(req.timeout.max(1)));
    if let Some(headers) = &req.headers {
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
    }
    if let Some(body) = &req.body {
        builder = builder.body(body.clone());
    }

    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            SyscallError::Timeout(format!("http request timed out after {}s", req.timeout))
        } else {
            SyscallError::Unavailable(format!("http request failed: {e}"))
        }
    })?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| SyscallError::Unavailable(format!("http body read failed: {e}")))?;

    kernel.audit.record(
        AuditCategory::Network,
        "SYS_HTTP",
        Some(agent.0),
        json!({"url": req.url, "method": method.as_str(), "status": status}),
    );
    Ok(json!({
        "success": (200..400).contains(&status),
        "status_code": status,
        "body": body,
        "mocked": false,
    }))
}
