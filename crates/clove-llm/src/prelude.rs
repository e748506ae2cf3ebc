//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_llm::prelude::*;` to import all essential types.

pub use crate::{
    ImagePayload, LlmConfig, LlmScheduler, LlmWorker, ThinkRequest, ThinkResponse, ThinkingLevel,
    WorkerError,
};
