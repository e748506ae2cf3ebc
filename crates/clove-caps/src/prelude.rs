//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_caps::prelude::*;` to import all essential types.

pub use crate::{Capabilities, PermissionLevel, ResourceLimits};
