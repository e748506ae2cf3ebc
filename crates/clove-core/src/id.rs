//! Kernel-assigned identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of a connected agent session.
///
/// Assigned by the kernel on the first frame of a connection, monotonically
/// increasing from 1. Id 0 in a request header means "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl AgentId {
    /// The unassigned sentinel carried by a client's first frame.
    pub const UNASSIGNED: Self = Self(0);

    /// Whether this id is the unassigned sentinel.
    #[must_use]
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Identifier of a simulated world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl WorldId {
    /// Wrap a raw world id string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorldId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
