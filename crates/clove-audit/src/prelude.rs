//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_audit::prelude::*;` to import all essential types.

// Audit ring
pub use crate::{AuditCategory, AuditConfig, AuditConfigPatch, AuditEntry, AuditLog};

// Recorder
pub use crate::{Recorder, RecorderOptions, RecordingEntry};

// Replay
pub use crate::{ReplayState, ReplayStatus, ReplayTracker};
