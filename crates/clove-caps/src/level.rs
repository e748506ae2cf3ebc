//! Named permission levels.

use serde::{Deserialize, Serialize};

/// Named preset of capabilities.
///
/// | Level          | Effect                                                        |
/// |----------------|---------------------------------------------------------------|
/// | `unrestricted` | all capabilities                                              |
/// | `standard`     | read/write in the working area, exec/HTTP on allowlists       |
/// | `sandboxed`    | read within explicit paths only                               |
/// | `readonly`     | read + think + http GET on allowlist; no mutations            |
/// | `minimal`      | noop + think only                                             |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// All capabilities.
    Unrestricted,
    /// Working-area read/write, allowlisted exec and HTTP.
    Standard,
    /// Read-only within explicit paths.
    Sandboxed,
    /// Read and query anything, mutate nothing.
    Readonly,
    /// Noop and think only.
    Minimal,
}

impl PermissionLevel {
    /// Parse a level name as it appears on the wire.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "unrestricted" => Some(Self::Unrestricted),
            "standard" => Some(Self::Standard),
            "sandboxed" => Some(Self::Sandboxed),
            "readonly" => Some(Self::Readonly),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }

    /// The wire name of this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Standard => "standard",
            Self::Sandboxed => "sandboxed",
            Self::Readonly => "readonly",
            Self::Minimal => "minimal",
        }
    }

    /// Ordering rank, higher grants more. Used to decide whether a
    /// `SYS_SET_PERMS` on another session is an upgrade.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Minimal => 0,
            Self::Readonly => 1,
            Self::Sandboxed => 2,
            Self::Standard => 3,
            Self::Unrestricted => 4,
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
