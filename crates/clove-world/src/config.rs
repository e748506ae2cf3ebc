//! World configuration, as carried by `SYS_WORLD_CREATE`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Per-file access mode in the virtual filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// Read-only; writes fail with `permission denied`.
    #[serde(rename = "r")]
    ReadOnly,
    /// Read-write.
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
}

/// A file seeded into the virtual filesystem at world creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSeed {
    /// Initial content.
    pub content: String,
    /// Access mode.
    #[serde(default)]
    pub mode: FileMode,
}

/// Virtual filesystem section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VfsConfig {
    /// Files present when the world starts.
    #[serde(default)]
    pub initial_files: HashMap<String, FileSeed>,
    /// Glob patterns under which new files may be created and rw files
    /// written. Evaluated in declared order.
    #[serde(default)]
    pub writable_patterns: Vec<String>,
    /// Glob patterns that refuse writes regardless of file mode. Evaluated
    /// before the writable list.
    #[serde(default)]
    pub readonly_patterns: Vec<String>,
}

/// Mock network section.
///
/// `mock_responses` maps a URL (exact, or a glob pattern) to a response
/// object `{status, body, latency_ms}`. Patterns are tried in declared
/// order after exact keys, which is why this stays an ordered JSON map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Only `mock` is meaningful; anything else disables the overlay.
    #[serde(default = "default_net_mode")]
    pub mode: String,
    /// URL (or glob) to mocked response.
    #[serde(default)]
    pub mock_responses: serde_json::Map<String, Value>,
    /// Fail requests that match no mock instead of passing them through.
    #[serde(default)]
    pub fail_unmatched: bool,
}

fn default_net_mode() -> String {
    "mock".to_string()
}

/// Latency envelope applied by the chaos engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LatencyEnvelope {
    /// Minimum injected latency.
    #[serde(default)]
    pub min_ms: u64,
    /// Maximum injected latency.
    #[serde(default)]
    pub max_ms: u64,
}

/// A chaos rule targeting file operations by path pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosRule {
    /// Rule kind, e.g. `file_read_fail` or `file_write_fail`.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Paths this rule applies to.
    pub path_pattern: String,
    /// Probability a matching operation fails, 0.0..=1.0.
    #[serde(default)]
    pub probability: f64,
}

/// Chaos section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChaosConfig {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,
    /// Base probability any overlay operation fails.
    #[serde(default)]
    pub failure_rate: f64,
    /// Latency envelope.
    #[serde(default)]
    pub latency: LatencyEnvelope,
    /// Targeted rules.
    #[serde(default)]
    pub rules: Vec<ChaosRule>,
}

/// The full world configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Virtual filesystem overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_filesystem: Option<VfsConfig>,
    /// Mock network overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
    /// Chaos engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos: Option<ChaosConfig>,
}

impl WorldConfig {
    /// Parse a wire config object. `null` means an empty config.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error for a malformed config.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
    }
}
