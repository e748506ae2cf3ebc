//! `SYS_THINK`.

use clove_core::SyscallResult;
use clove_llm::ThinkRequest;
use serde_json::Value;
use std::sync::Arc;

use super::parse;
use crate::kernel::Kernel;

pub(crate) async fn think(kernel: &Arc<Kernel>, request: &Value) -> SyscallResult<Value> {
    let req: ThinkRequest = parse(request)?;
    // FIFO across all sessions; only this connection waits.
    let response = kernel.llm.think(req).await;
    Ok(serde_json::to_value(response)?)
}
