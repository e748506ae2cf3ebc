//! Clove IPC - the inter-agent message broker.
//!
//! This crate provides:
//! - A name registry (`name → agent id`, unique, first-writer-wins,
//!   released on session close)
//! - Bounded per-agent FIFO mailboxes
//! - Best-effort broadcast to every registered agent
//!
//! Senders are never blocked: a full mailbox fails the enqueue immediately
//! and the caller decides what to do with the refusal.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod broker;

pub use broker::{BroadcastOutcome, DrainedMessage, IpcBroker, DEFAULT_MAILBOX_CAPACITY};
