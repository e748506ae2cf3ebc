//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_ipc::prelude::*;` to import all essential types.

pub use crate::{BroadcastOutcome, DrainedMessage, DEFAULT_MAILBOX_CAPACITY, IpcBroker};
