//! Typed request payloads for the syscall surface.
//!
//! Deterministic opcodes that participate in record/replay deserialize
//! strictly (`deny_unknown_fields`) so a recording made against one kernel
//! build cannot silently change meaning on another. Non-deterministic
//! opcodes (`EXEC`, `HTTP`) stay lenient.
//!
//! Field names are the wire ABI; response payloads are built ad hoc by the
//! handlers since they are plain `{success, ...}` JSON objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_exec_timeout() -> u64 {
    30
}

fn default_http_timeout() -> u64 {
    30
}

fn default_http_method() -> String {
    "GET".to_string()
}

fn default_recv_max() -> usize {
    10
}

fn default_poll_max() -> usize {
    10
}

fn default_audit_limit() -> usize {
    100
}

fn default_store_scope() -> String {
    "global".to_string()
}

// ---------------------------------------------------------------------------
// Effectors
// ---------------------------------------------------------------------------

/// `SYS_EXEC` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecRequest {
    /// Shell command line.
    pub command: String,
    /// Working directory override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Deadline in seconds; the command group is killed on expiry.
    #[serde(default = "default_exec_timeout")]
    pub timeout: u64,
}

/// `SYS_READ` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadRequest {
    /// Path to read (world VFS path when joined).
    pub path: String,
}

/// File write mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Truncate and write.
    #[default]
    Write,
    /// Append to the end.
    Append,
}

/// `SYS_WRITE` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteRequest {
    /// Path to write (world VFS path when joined).
    pub path: String,
    /// Content to write.
    pub content: String,
    /// Truncate or append.
    #[serde(default)]
    pub mode: WriteMode,
}

/// `SYS_HTTP` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Target URL.
    pub url: String,
    /// HTTP method (GET/POST/PUT/DELETE/PATCH/HEAD).
    #[serde(default = "default_http_method")]
    pub method: String,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Deadline in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout: u64,
}

// ---------------------------------------------------------------------------
// Agent management
// ---------------------------------------------------------------------------

/// Target of `SYS_KILL` / `SYS_PAUSE` / `SYS_RESUME`: id or registered name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentTarget {
    /// Agent id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Registered agent name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// IPC
// ---------------------------------------------------------------------------

/// `SYS_SEND` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendRequest {
    /// Recipient agent id; any live session id is addressable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
    /// Recipient registered name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
    /// Message body (arbitrary JSON).
    pub message: Value,
}

/// `SYS_RECV` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecvRequest {
    /// Maximum entries to drain.
    #[serde(default = "default_recv_max")]
    pub max: usize,
}

/// `SYS_BROADCAST` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastRequest {
    /// Message body (arbitrary JSON).
    pub message: Value,
    /// Deliver to the caller's own mailbox as well.
    #[serde(default)]
    pub include_self: bool,
}

/// `SYS_REGISTER` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    /// Name to claim (unique, first-writer-wins).
    pub name: String,
}

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

/// `SYS_STORE` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreRequest {
    /// Key.
    pub key: String,
    /// Arbitrary JSON value.
    pub value: Value,
    /// `global`, `agent` or `world`.
    #[serde(default = "default_store_scope")]
    pub scope: String,
    /// TTL in seconds; 0 or absent never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// `SYS_FETCH` / `SYS_DELETE` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyRequest {
    /// Key.
    pub key: String,
}

/// `SYS_KEYS` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeysRequest {
    /// Only keys starting with this prefix.
    #[serde(default)]
    pub prefix: String,
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// `SYS_SET_PERMS` request.
///
/// Either a named `level` or an explicit `permissions` object; `agent_id`
/// targets another session (requires the set-perms capability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPermsRequest {
    /// Named permission level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Explicit capability set (same shape as `SYS_GET_PERMS` output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
    /// Target session; absent means the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u32>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// `SYS_SUBSCRIBE` / `SYS_UNSUBSCRIBE` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionRequest {
    /// Event type strings to add/remove from the mask.
    pub event_types: Vec<String>,
}

/// `SYS_POLL_EVENTS` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollEventsRequest {
    /// Maximum events to drain.
    #[serde(default = "default_poll_max")]
    pub max: usize,
}

/// `SYS_EMIT` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmitRequest {
    /// Event type string delivered to matching subscribers.
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Audit & record/replay
// ---------------------------------------------------------------------------

/// `SYS_GET_AUDIT_LOG` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAuditLogRequest {
    /// Only entries with id greater than this.
    #[serde(default)]
    pub since_id: u64,
    /// Filter by category name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Filter by agent id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u32>,
    /// Maximum entries returned.
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
}

/// `SYS_RECORD_STATUS` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStatusRequest {
    /// Include the serialized recording in the response.
    #[serde(default)]
    pub export: bool,
}

/// `SYS_REPLAY_START` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayStartRequest {
    /// JSON array of recording entries, as exported by `SYS_RECORD_STATUS`.
    pub recording: String,
}

// ---------------------------------------------------------------------------
// Worlds
// ---------------------------------------------------------------------------

/// `SYS_WORLD_CREATE` request. The config shape is owned by the world engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldCreateRequest {
    /// Human-readable world name.
    pub name: String,
    /// World configuration object.
    #[serde(default)]
    pub config: Value,
}

/// `SYS_WORLD_DESTROY` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldDestroyRequest {
    /// World to destroy.
    pub world_id: String,
    /// Destroy even while sessions are joined.
    #[serde(default)]
    pub force: bool,
}

/// `SYS_WORLD_JOIN` / `SYS_WORLD_STATE` / `SYS_WORLD_SNAPSHOT` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldIdRequest {
    /// Target world.
    pub world_id: String,
}

/// `SYS_WORLD_EVENT` request (chaos injection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldEventRequest {
    /// Target world.
    pub world_id: String,
    /// Failure mode, e.g. `disk_fail` or `network_restore`.
    pub event_type: String,
    /// Mode-specific parameters.
    #[serde(default)]
    pub params: Value,
}

/// `SYS_WORLD_RESTORE` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldRestoreRequest {
    /// Snapshot object from `SYS_WORLD_SNAPSHOT`.
    pub snapshot: Value,
    /// Id for the restored world; empty picks a fresh uuid.
    #[serde(default)]
    pub new_world_id: String,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// `SYS_METRICS_AGENT` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsAgentRequest {
    /// Agent to sample; absent means the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u32>,
}

/// `SYS_METRICS_CGROUP` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsCgroupRequest {
    /// Cgroup directory to sample; absent means the kernel's spawn root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgroup_path: Option<String>,
}
