//! Clove Kernel - the daemon that mediates every privileged operation of
//! connected agent processes.
//!
//! Clients connect over a local Unix stream socket and issue numbered
//! syscalls (see `clove-protocol`). The kernel enforces per-session
//! permissions, isolates spawned agents, serializes access to the one LLM
//! worker, brokers inter-agent messages, owns the state store, and taps
//! every dispatched syscall for audit and record/replay.
//!
//! # Structure
//!
//! - [`config`]: TOML config with CLI overrides
//! - [`Kernel`]: component wiring and the accept loop
//! - `session`: per-connection frame loop and teardown
//! - `dispatch`: opcode routing, permission gate, audit/record taps
//! - `handlers`: one module per syscall family

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod logging;

mod dispatch;
mod gate;
mod handlers;
mod kernel;
mod session;

pub use config::KernelConfig;
pub use kernel::Kernel;
