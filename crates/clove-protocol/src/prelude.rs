//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_protocol::prelude::*;` to import all essential types.

// Framing
pub use crate::{Frame, FrameError, HEADER_LEN, MAGIC, MAX_PAYLOAD, read_frame, write_frame};

// Opcodes
pub use crate::Opcode;

// Payloads
pub use crate::payload::{
    AgentTarget, BroadcastRequest, EmitRequest, ExecRequest, GetAuditLogRequest, HttpRequest,
    KeyRequest, KeysRequest, PollEventsRequest, ReadRequest, RecordStatusRequest, RecvRequest,
    RegisterRequest, ReplayStartRequest, SendRequest, SetPermsRequest, StoreRequest,
    SubscriptionRequest, WorldCreateRequest, WorldDestroyRequest, WorldEventRequest,
    WorldIdRequest, WorldRestoreRequest, WriteMode, WriteRequest,
};
