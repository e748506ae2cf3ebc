//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_store::prelude::*;` to import all essential types.

pub use crate::{Owner, Scope, StateStore};
