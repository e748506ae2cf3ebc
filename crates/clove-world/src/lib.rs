//! Clove World - the simulation overlay.
//!
//! A world is an environment descriptor that, once a session joins it,
//! transparently replaces some effectors:
//!
//! - [`VirtualFs`]: reads and writes target an in-memory tree seeded from
//!   config, with per-path modes and ordered writable/readonly patterns.
//! - [`MockNet`]: HTTP requests match exact URLs first, then glob patterns
//!   in declared order.
//! - [`ChaosEngine`]: a base failure/latency envelope plus one-shot injected
//!   faults (`disk_fail`, `network_fail`, ...).
//!
//! Worlds snapshot to plain JSON and restore under a fresh id.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod chaos;
mod config;
mod net;
mod registry;
mod vfs;
mod world;

pub use chaos::{ChaosEngine, ChaosMetrics, FileOp};
pub use config::{
    ChaosConfig, ChaosRule, FileMode, FileSeed, LatencyEnvelope, NetworkConfig, VfsConfig,
    WorldConfig,
};
pub use net::{MockNet, MockResponse};
pub use registry::WorldRegistry;
pub use vfs::VirtualFs;
pub use world::World;
