//! Clove Audit - observability taps for the syscall dispatcher.
//!
//! This crate provides:
//! - A bounded in-memory audit ring with per-category filters and strictly
//!   increasing entry ids
//! - The execution recorder: a bounded buffer of request/response pairs,
//!   filtered to deterministic opcodes by default
//! - The replay progress tracker driven by the kernel's replay task
//!
//! Everything here is in-memory; nothing is persisted across kernel restarts.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod recorder;
mod replay;
mod ring;

pub use recorder::{RecorderOptions, Recorder, RecordingEntry};
pub use replay::{ReplayState, ReplayStatus, ReplayTracker};
pub use ring::{AuditCategory, AuditConfig, AuditConfigPatch, AuditEntry, AuditLog};
