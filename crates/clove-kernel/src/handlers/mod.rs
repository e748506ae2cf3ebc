//! Syscall handlers, one module per family.
//!
//! Every handler returns `SyscallResult<Value>` where the `Value` is the
//! full response body including `"success"`. Errors render uniformly in the
//! dispatcher.

use clove_caps::Capabilities;
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_protocol::Opcode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::kernel::Kernel;

pub(crate) mod agents;
pub(crate) mod events;
pub(crate) mod exec;
pub(crate) mod fs;
pub(crate) mod http;
pub(crate) mod ipc;
pub(crate) mod llm;
pub(crate) mod metrics;
pub(crate) mod perms;
pub(crate) mod record;
pub(crate) mod store;
pub(crate) mod world;

/// Parse a request body into its typed payload.
pub(crate) fn parse<T: DeserializeOwned>(request: &Value) -> SyscallResult<T> {
    serde_json::from_value(request.clone()).map_err(Into::into)
}

/// Route a gated request to its handler.
pub(crate) async fn handle(
    kernel: &Arc<Kernel>,
    agent: AgentId,
    op: Opcode,
    request: &Value,
    caps: &Capabilities,
) -> SyscallResult<Value> {
    use Opcode as Op;
    match op {
        // Handled before routing (echo / session close).
        Op::Noop | Op::Exit => Ok(serde_json::json!({"success": true})),

        Op::Think => llm::think(kernel, request).await,
        Op::Exec => exec::run(kernel, agent, request, caps).await,
        Op::Read => fs::read(kernel, agent, request, caps).await,
        Op::Write => fs::write(kernel, agent, request, caps).await,

        Op::Spawn => agents::spawn(kernel, request, caps),
        Op::Kill => agents::kill(kernel, request, caps).await,
        Op::List => agents::list(kernel),
        Op::Pause => agents::pause(kernel, request, caps),
        Op::Resume => agents::resume(kernel, request, caps),

        Op::Send => ipc::send(kernel, agent, request),
        Op::Recv => ipc::recv(kernel, agent, request),
        Op::Broadcast => ipc::broadcast(kernel, agent, request),
        Op::Register => ipc::register(kernel, agent, request),

        Op::Store => store::store(kernel, agent, request),
        Op::Fetch => store::fetch(kernel, agent, request),
        Op::Delete => store::delete(kernel, agent, request),
        Op::Keys => store::keys(kernel, agent, request),

        Op::GetPerms => perms::get(caps),
        Op::SetPerms => perms::set(kernel, agent, request, caps),

        Op::Http => http::request(kernel, agent, request, caps).await,

        Op::Subscribe => events::subscribe(kernel, agent, request),
        Op::Unsubscribe => events::unsubscribe(kernel, agent, request),
        Op::PollEvents => events::poll(kernel, agent, request),
        Op::Emit => events::emit(kernel, agent, request),

        Op::RecordStart => record::start(kernel, request),
        Op::RecordStop => record::stop(kernel),
        Op::RecordStatus => record::status(kernel, request),
        Op::ReplayStart => record::replay_start(kernel, request),
        Op::ReplayStatus => record::replay_status(kernel),
        Op::GetAuditLog => record::get_audit_log(kernel, request),
        Op::SetAuditConfig => record::set_audit_config(kernel, request),

        Op::WorldCreate => world::create(kernel, agent, request),
        Op::WorldDestroy => world::destroy(kernel, agent, request),
        Op::WorldList => world::list(kernel),
        Op::WorldJoin => world::join(kernel, agent, request),
        Op::WorldLeave => world::leave(kernel, agent),
        Op::WorldEvent => world::event(kernel, agent, request),
        Op::WorldState => world::state(kernel, request),
        Op::WorldSnapshot => world::snapshot(kernel, request),
        Op::WorldRestore => world::restore(kernel, request),

        Op::MetricsSystem => metrics::system(kernel).await,
        Op::MetricsAgent => metrics::agent(kernel, agent, request).await,
        Op::MetricsAllAgents => metrics::all_agents(kernel).await,
        Op::MetricsCgroup => metrics::cgroup(kernel, request).await,

        // Reserved opcode space; the relay surface is not part of the kernel.
        Op::TunnelConnect
        | Op::TunnelDisconnect
        | Op::TunnelStatus
        | Op::TunnelListRemotes
        | Op::TunnelConfig => Err(SyscallError::Unavailable(
            "tunnel support disabled".to_string(),
        )),
    }
}
