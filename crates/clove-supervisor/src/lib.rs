//! Clove Supervisor - child agent lifecycle management.
//!
//! The supervisor owns every spawned agent process. Sessions hold only the
//! child's agent id; signals and waits go through the supervisor, and child
//! agents outlive the connection that spawned them.
//!
//! Sandboxed children are launched inside fresh mount+pid+uts namespaces
//! (plus a net namespace when networking is off) and placed under a
//! dedicated cgroup v2 directory carrying the spec's resource limits. If
//! isolation cannot be set up, the spawn fails; the kernel never silently
//! downgrades isolation.
//!
//! Restart policies run per child in a monitor task:
//!
//! ```text
//!   NEW ──spawn──▶ RUNNING ──stop──▶ STOPPED
//!                    │
//!                    ├─SIGSTOP─▶ PAUSED ─SIGCONT─▶ RUNNING
//!                    │
//!                    └─exit─▶ EXITED(code) ─policy─▶ RESTART_WAIT ─▶ RUNNING
//!                                   │                     (attempt++)
//!                                   └─ attempts exhausted ─▶ ESCALATED
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod cgroup;
mod child;
mod sandbox;
mod spec;
mod supervisor;

pub use cgroup::CgroupScope;
pub use child::{AgentState, ChildInfo};
pub use spec::{RestartPolicy, SpawnLimits, SpawnSpec};
pub use supervisor::{Supervisor, SupervisorConfig};
