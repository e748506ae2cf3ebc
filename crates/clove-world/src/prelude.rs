//! Prelude module - commonly used types for convenient import.
//!
//! Use `use clove_world::prelude::*;` to import all essential types.

// Registry and worlds
pub use crate::{World, WorldRegistry};

// Overlays
pub use crate::{ChaosEngine, ChaosMetrics, FileOp, MockNet, MockResponse, VirtualFs};

// Config
pub use crate::{
    ChaosConfig, ChaosRule, FileMode, FileSeed, LatencyEnvelope, NetworkConfig, VfsConfig,
    WorldConfig,
};
