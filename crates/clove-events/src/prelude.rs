//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_events::prelude::*;` to import all essential types.

pub use crate::types;
pub use crate::{DEFAULT_BACKLOG_CAPACITY, EventHub, KernelEvent};
