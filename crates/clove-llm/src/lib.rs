//! Clove LLM - arbitration of the one shared LLM worker.
//!
//! The kernel runs exactly one long-lived worker subprocess. Its contract:
//! one request JSON object per line on stdin, one response JSON object per
//! line on stdout. All `SYS_THINK` requests cross a single-producer queue
//! into a dedicated task that owns the worker's pipes, so the worker sees
//! requests in arrival order and every response is paired with the request
//! that produced it.
//!
//! A failed worker fails the in-flight request once, drains the queue with
//! the same error, and is respawned lazily on the next request.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod scheduler;
mod types;
mod worker;

pub use scheduler::{LlmConfig, LlmScheduler};
pub use types::{ImagePayload, ThinkRequest, ThinkResponse, ThinkingLevel};
pub use worker::{LlmWorker, WorkerError};
