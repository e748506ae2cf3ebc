//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_core::prelude::*;` to import all essential types.

pub use crate::{AgentId, SyscallError, SyscallResult, WorldId};
