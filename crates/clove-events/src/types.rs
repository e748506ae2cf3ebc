//! Well-known kernel event types.
//!
//! User-emitted events may use any type string; these are the ones the
//! kernel itself produces.

/// A child agent process was spawned.
pub const AGENT_SPAWNED: &str = "AGENT_SPAWNED";
/// A child agent process exited.
pub const AGENT_EXITED: &str = "AGENT_EXITED";
/// A child agent is waiting out its restart backoff.
pub const AGENT_RESTARTING: &str = "AGENT_RESTARTING";
/// A child agent exhausted its restart budget; operator attention required.
pub const AGENT_ESCALATED: &str = "AGENT_ESCALATED";
/// A child agent was killed on request.
pub const AGENT_KILLED: &str = "AGENT_KILLED";
/// A child agent was paused with SIGSTOP.
pub const AGENT_PAUSED: &str = "AGENT_PAUSED";
/// A child agent was resumed with SIGCONT.
pub const AGENT_RESUMED: &str = "AGENT_RESUMED";
/// A capability check denied a syscall.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
/// A world was created.
pub const WORLD_CREATED: &str = "WORLD_CREATED";
/// A world was destroyed.
pub const WORLD_DESTROYED: &str = "WORLD_DESTROYED";
/// Default type for user-emitted events.
pub const CUSTOM: &str = "CUSTOM";
