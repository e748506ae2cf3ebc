//! Clove Store - the process-wide scoped key/value store.
//!
//! Records are keyed by `(scope owner, key)`:
//! - `global` ignores the owner,
//! - `agent` scopes to the calling session's agent id,
//! - `world` scopes to the caller's current world.
//!
//! TTL semantics: `0` or absent never expires; negative TTL is rejected.
//! Expired records are removed lazily on read and eagerly by a periodic
//! sweeper so memory stays bounded.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod store;

pub use store::{Owner, Scope, StateStore};
