//! `SYS_SUBSCRIBE` / `SYS_UNSUBSCRIBE` / `SYS_POLL_EVENTS` / `SYS_EMIT`.

use clove_core::{AgentId, SyscallResult};
use clove_events::KernelEvent;
use clove_protocol::payload::{EmitRequest, PollEventsRequest, SubscriptionRequest};
use serde_json::{Value, json};
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) fn subscribe(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: SubscriptionRequest = parse(request)?;
    let mask = kernel.events.subscribe(agent, &req.event_types);
    Ok(json!({"success": true, "subscribed": mask}))
}

pub(crate) fn unsubscribe(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    request: &Value,
) -> SyscallResult<Value> {
    let req: SubscriptionRequest = parse(request)?;
    let mask = kernel.events.unsubscribe(agent, &req.event_types);
    Ok(json!({"success": true, "unsubscribed": mask}))
}

pub(crate) fn poll(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: PollEventsRequest = parse(request)?;
    let events = kernel.events.poll(agent, req.max);
    Ok(json!({
        "success": true,
        "count": events.len(),
        "events": events,
    }))
}

pub(crate) fn emit(kernel: &Arc<Kernel>, agent: AgentId, request: &Value) -> SyscallResult<Value> {
    let req: EmitRequest = parse(request)?;
    let mut data = req.data;
    // Stamp the emitter so subscribers can tell custom events apart.
    if let Value::Object(map) = &mut data {
        map.insert("emitted_by".to_string(), json!(agent.0));
    }
    let delivered = kernel
        .events
        .publish(&KernelEvent::new(req.event_type, data));
    Ok(json!({"success": true, "delivered_to": delivered}))
}
