//! The uniform syscall error kinds.
//!
//! Every handler recovers locally and responds with one of these kinds; the
//! kernel never aborts on a bad frame. The wire rendering is always
//! `{"success": false, "error": "<message>"}`.

use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced to callers of any syscall.
#[derive(Debug, Clone, Error)]
pub enum SyscallError {
    /// Capability check failed; a SECURITY audit entry is emitted.
    #[error("permission denied")]
    PermissionDenied,

    /// Malformed JSON or missing required field.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown name, id, key, world, or path.
    ///
    /// The message is the full wire string ("unknown recipient",
    /// "no mock matches", ...), not a prefix-decorated one.
    #[error("{0}")]
    NotFound(String),

    /// Name already registered, world occupied on destroy, duplicate spawn.
    #[error("{0}")]
    Conflict(String),

    /// Mailbox full, event backlog full, frame too large.
    #[error("{0}")]
    ResourceExhausted(String),

    /// Exec/http/think deadline exceeded.
    #[error("{0}")]
    Timeout(String),

    /// LLM worker unhealthy, or namespace/cgroup support missing when required.
    #[error("{0}")]
    Unavailable(String),

    /// Invariant violation; accompanied by an audit entry.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyscallError {
    /// Shorthand for a `BadRequest` with a message.
    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Shorthand for a `NotFound` with a message.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Render as the uniform wire payload.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({ "success": false, "error": self.to_string() })
    }

    /// Whether this error is a capability denial.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

impl From<serde_json::Error> for SyscallError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(format!("malformed payload: {e}"))
    }
}

/// Result type for syscall handlers.
pub type SyscallResult<T> = Result<T, SyscallError>;
