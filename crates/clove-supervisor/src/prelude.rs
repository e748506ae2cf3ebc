//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_supervisor::prelude::*;` to import all essential types.

pub use crate::{
    AgentState, CgroupScope, ChildInfo, RestartPolicy, SpawnLimits, SpawnSpec, Supervisor,
    SupervisorConfig,
};
