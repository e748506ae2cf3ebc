//! Per-connection session loop.
//!
//! One task per connection. The task owns both stream halves, so responses
//! are naturally serialized in request order. A session is allocated on the
//! first frame; the reply carries the assigned agent id, which the client
//! adopts for subsequent frames.

use clove_core::{AgentId, SyscallError};
use clove_protocol::{Frame, FrameError, Opcode, read_frame, write_frame};
use serde_json::json;
use std::sync::Arc;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::dispatch;
use crate::kernel::Kernel;

pub(crate) async fn run_session(kernel: Arc<Kernel>, stream: UnixStream) {
    let (mut reader, mut writer) = stream.into_split();
    let mut agent: Option<AgentId> = None;

    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                let id = *agent.get_or_insert_with(|| kernel.open_session());

                if frame.opcode == Opcode::Exit as u8 {
                    let payload = json!({"success": true}).to_string().into_bytes();
                    let _ = write_frame(&mut writer, &Frame::new(id, frame.opcode, payload)).await;
                    break;
                }

                let response =
                    dispatch::dispatch_frame(&kernel, id, frame.opcode, &frame.payload).await;
                if write_frame(&mut writer, &Frame::new(id, frame.opcode, response))
                    .await
                    .is_err()
                {
                    break;
                }
            },
            // Clean close between frames.
            Ok(None) => break,
            Err(FrameError::TooLarge {
                agent_id, opcode, declared,
            }) => {
                // The header was consumed but the payload never will be;
                // answer, then drop the connection.
                let id = agent.unwrap_or(agent_id);
                debug!(agent = %id, declared, "Rejecting oversized frame");
                let payload = SyscallError::ResourceExhausted("frame too large".to_string())
                    .to_payload()
                    .to_string()
                    .into_bytes();
                let _ = write_frame(&mut writer, &Frame::new(id, opcode, payload)).await;
                break;
            },
            Err(FrameError::InvalidMagic(magic)) => {
                warn!(magic = format!("0x{magic:08x}"), "Invalid frame magic; closing");
                break;
            },
            // Short read mid-frame or transport failure: close silently.
            Err(FrameError::Io(_)) => break,
        }
    }

    if let Some(id) = agent {
        kernel.close_session(id);
    }
}
