//! Clove Core - shared identifiers and error kinds for the Clove agent kernel.
//!
//! This crate provides:
//! - Newtype identifiers for agents and worlds
//! - The uniform syscall error kinds every handler surfaces
//! - Rendering of errors into the wire `{success:false, error}` payload

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod id;

pub use error::{SyscallError, SyscallResult};
pub use id::{AgentId, WorldId};
