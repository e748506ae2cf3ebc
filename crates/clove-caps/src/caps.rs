//! Capability sets and the checks performed before effectful syscalls.

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::level::PermissionLevel;

/// Resource limits applied to spawned children of this session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// `memory.max` in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// CPU quota as a percentage of one core (`cpu.max`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<u32>,
    /// `pids.max`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pids: Option<u32>,
}

/// The capability set held by one session.
///
/// Serializes as the `SYS_GET_PERMS` response body and deserializes from the
/// explicit-permissions form of `SYS_SET_PERMS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// The named level this set was derived from.
    pub level: PermissionLevel,
    /// May read files.
    pub can_read: bool,
    /// May write files.
    pub can_write: bool,
    /// May execute shell commands.
    pub can_exec: bool,
    /// May issue HTTP requests.
    pub can_http: bool,
    /// HTTP restricted to GET/HEAD.
    #[serde(default)]
    pub http_get_only: bool,
    /// May spawn and manage child agents.
    pub can_spawn: bool,
    /// May change other sessions' permissions.
    pub can_set_perms: bool,
    /// Spawned children get network access.
    pub network: bool,
    /// Readable path globs; `None` = any path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_paths: Option<Vec<String>>,
    /// Writable path globs; `None` = any path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_paths: Option<Vec<String>>,
    /// Allowed command names (first token of the command line); `None` = any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_commands: Option<Vec<String>>,
    /// Allowed HTTP host suffixes; `None` = any host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_domains: Option<Vec<String>>,
    /// Limits inherited by spawned children.
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl Capabilities {
    /// Derive a capability set from a named level.
    ///
    /// `working_area` scopes the `standard` and `sandboxed` levels; it is a
    /// directory prefix, typically the kernel's configured agent workspace.
    #[must_use]
    pub fn from_level(level: PermissionLevel, working_area: &str) -> Self {
        let area = working_area.trim_end_matches('/');
        let area_glob = vec![format!("{area}/**"), "/tmp/**".to_string()];
        match level {
            PermissionLevel::Unrestricted => Self {
                level,
                can_read: true,
                can_write: true,
                can_exec: true,
                can_http: true,
                http_get_only: false,
                can_spawn: true,
                can_set_perms: true,
                network: true,
                read_paths: None,
                write_paths: None,
                exec_commands: None,
                http_domains: None,
                limits: ResourceLimits::default(),
            },
            PermissionLevel::Standard => Self {
                level,
                can_read: true,
                can_write: true,
                can_exec: true,
                can_http: true,
                http_get_only: false,
                can_spawn: false,
                can_set_perms: false,
                network: true,
                read_paths: Some(area_glob.clone()),
                write_paths: Some(area_glob),
                exec_commands: Some(
                    ["ls", "cat", "echo", "pwd", "mkdir", "grep", "head", "tail", "wc", "date"]
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                ),
                http_domains: Some(Vec::new()),
                limits: ResourceLimits::default(),
            },
            PermissionLevel::Sandboxed => Self {
                level,
                can_read: true,
                can_write: false,
                can_exec: false,
                can_http: false,
                http_get_only: false,
                can_spawn: false,
                can_set_perms: false,
                network: false,
                read_paths: Some(area_glob),
                write_paths: Some(Vec::new()),
                exec_commands: Some(Vec::new()),
                http_domains: Some(Vec::new()),
                limits: ResourceLimits::default(),
            },
            PermissionLevel::Readonly => Self {
                level,
                can_read: true,
                can_write: false,
                can_exec: false,
                can_http: true,
                http_get_only: true,
                can_spawn: false,
                can_set_perms: false,
                network: false,
                read_paths: None,
                write_paths: Some(Vec::new()),
                exec_commands: Some(Vec::new()),
                http_domains: Some(Vec::new()),
                limits: ResourceLimits::default(),
            },
            PermissionLevel::Minimal => Self {
                level,
                can_read: false,
                can_write: false,
                can_exec: false,
                can_http: false,
                http_get_only: false,
                can_spawn: false,
                can_set_perms: false,
                network: false,
                read_paths: Some(Vec::new()),
                write_paths: Some(Vec::new()),
                exec_commands: Some(Vec::new()),
                http_domains: Some(Vec::new()),
                limits: ResourceLimits::default(),
            },
        }
    }

    /// Whether `path` is readable under this set.
    #[must_use]
    pub fn allows_read(&self, path: &str) -> bool {
        self.can_read && matches_path(self.read_paths.as_deref(), path)
    }

    /// Whether `path` is writable under this set.
    #[must_use]
    pub fn allows_write(&self, path: &str) -> bool {
        self.can_write && matches_path(self.write_paths.as_deref(), path)
    }

    /// Whether `command` may be executed.
    ///
    /// Only the first token of the command line is checked against the
    /// allowlist; shells are spawned with the full line once it passes.
    #[must_use]
    pub fn allows_exec(&self, command: &str) -> bool {
        if !self.can_exec {
            return false;
        }
        let Some(patterns) = self.exec_commands.as_deref() else {
            return true;
        };
        let first = command.split_whitespace().next().unwrap_or("");
        let base = first.rsplit('/').next().unwrap_or(first);
        patterns.iter().any(|p| p == first || p == base)
    }

    /// Whether an HTTP request to `url` with `method` is allowed.
    #[must_use]
    pub fn allows_http(&self, url: &str, method: &str) -> bool {
        if !self.can_http {
            return false;
        }
        if self.http_get_only && !matches!(method, "GET" | "HEAD") {
            return false;
        }
        let Some(domains) = self.http_domains.as_deref() else {
            return true;
        };
        let host = host_of(url);
        domains
            .iter()
            .any(|d| host == d.as_str() || host.ends_with(&format!(".{d}")))
    }

    /// Whether mutating kernel state (store writes, IPC sends, world edits,
    /// recording control) is allowed at all.
    #[must_use]
    pub fn allows_mutation(&self) -> bool {
        !matches!(
            self.level,
            PermissionLevel::Readonly | PermissionLevel::Minimal
        )
    }

    /// Whether anything beyond noop/think/get-perms is allowed.
    #[must_use]
    pub fn allows_queries(&self) -> bool {
        !matches!(self.level, PermissionLevel::Minimal)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::from_level(PermissionLevel::Standard, "/tmp/clove")
    }
}

/// Match a path against a whitelist. `None` is unrestricted. Entries with
/// glob metacharacters match as globs; plain entries match as path prefixes.
fn matches_path(patterns: Option<&[String]>, path: &str) -> bool {
    let Some(patterns) = patterns else {
        return true;
    };
    patterns.iter().any(|pat| {
        if pat.contains(['*', '?', '[']) {
            // literal_separator keeps `*` within one path component; `**`
            // still crosses directories.
            match GlobBuilder::new(pat).literal_separator(true).build() {
                Ok(glob) => glob.compile_matcher().is_match(path),
                Err(e) => {
                    warn!(pattern = %pat, error = %e, "Ignoring unparseable path pattern");
                    false
                },
            }
        } else {
            path == pat || path.starts_with(&format!("{}/", pat.trim_end_matches('/')))
        }
    })
}

/// Extract the host portion of a URL without pulling in a URL parser.
fn host_of(url: &str) -> &str {
    let rest = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    // Strip userinfo and port.
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    host.split_once(':').map_or(host, |(host, _)| host)
}
