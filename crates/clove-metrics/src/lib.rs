//! Clove Metrics - resource observability for the kernel and its agents.
//!
//! Samples `/proc` for system-wide CPU, load, memory, disk and network
//! figures, per-process CPU and RSS for agents, and cgroup v2 stat files
//! for sandboxed children. Rate values (CPU percent) derive from two
//! samples a short interval apart.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod collector;
mod proc;

pub use collector::MetricsCollector;
