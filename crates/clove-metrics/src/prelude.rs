//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_metrics::prelude::*;` to import all essential types.

pub use crate::MetricsCollector;
