//! Clove Events - the kernel event hub.
//!
//! Events are string-typed `{type, data, at}` records multicast to every
//! session whose subscription mask includes the type. Each session owns a
//! bounded backlog drained by `SYS_POLL_EVENTS`; overflow drops the oldest
//! event so a slow consumer never grows kernel memory.
//!
//! Kernel components (supervisor, security checks, worlds) publish through
//! the same hub as user-emitted custom events.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;
pub mod types;

mod hub;

pub use hub::{DEFAULT_BACKLOG_CAPACITY, EventHub, KernelEvent};
