//! The bounded audit ring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::trace;

/// Categories an audit entry can belong to; each has an independent filter
/// switch in [`AuditConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    /// Every dispatched syscall (verbose; off by default).
    #[serde(rename = "SYSCALL")]
    Syscall,
    /// Permission denials and capability changes.
    #[serde(rename = "SECURITY")]
    Security,
    /// Spawn/exit/restart/escalation of child agents.
    #[serde(rename = "AGENT_LIFECYCLE")]
    AgentLifecycle,
    /// Message sends, broadcasts, registrations.
    #[serde(rename = "IPC")]
    Ipc,
    /// State store mutations.
    #[serde(rename = "STATE")]
    State,
    /// Overflow boundaries: full mailboxes, dropped events, output caps.
    #[serde(rename = "RESOURCE")]
    Resource,
    /// HTTP requests.
    #[serde(rename = "NETWORK")]
    Network,
    /// World creation, membership, chaos injection.
    #[serde(rename = "WORLD")]
    World,
}

impl AuditCategory {
    /// Wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Syscall => "SYSCALL",
            Self::Security => "SECURITY",
            Self::AgentLifecycle => "AGENT_LIFECYCLE",
            Self::Ipc => "IPC",
            Self::State => "STATE",
            Self::Resource => "RESOURCE",
            Self::Network => "NETWORK",
            Self::World => "WORLD",
        }
    }

    /// Parse a wire category name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SYSCALL" => Some(Self::Syscall),
            "SECURITY" => Some(Self::Security),
            "AGENT_LIFECYCLE" => Some(Self::AgentLifecycle),
            "IPC" => Some(Self::Ipc),
            "STATE" => Some(Self::State),
            "RESOURCE" => Some(Self::Resource),
            "NETWORK" => Some(Self::Network),
            "WORLD" => Some(Self::World),
            _ => None,
        }
    }
}

/// One audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Strictly increasing id.
    pub id: u64,
    /// Entry time.
    pub timestamp: DateTime<Utc>,
    /// Category.
    pub category: AuditCategory,
    /// Event type, e.g. `PERMISSION_DENIED` or a `SYS_*` name.
    pub event_type: String,
    /// The session the entry concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u32>,
    /// Free-form details.
    pub details: Value,
}

fn default_max_entries() -> usize {
    10_000
}

fn default_on() -> bool {
    true
}

/// Per-category audit filters plus the ring bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Ring capacity; oldest entries fall off.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Log every dispatched syscall (verbose).
    #[serde(default)]
    pub log_syscalls: bool,
    /// Log security events.
    #[serde(default = "default_on")]
    pub log_security: bool,
    /// Log agent lifecycle events.
    #[serde(default = "default_on")]
    pub log_lifecycle: bool,
    /// Log IPC events.
    #[serde(default = "default_on")]
    pub log_ipc: bool,
    /// Log state store events.
    #[serde(default = "default_on")]
    pub log_state: bool,
    /// Log resource events.
    #[serde(default = "default_on")]
    pub log_resource: bool,
    /// Log network events.
    #[serde(default = "default_on")]
    pub log_network: bool,
    /// Log world simulation events.
    #[serde(default = "default_on")]
    pub log_world: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            log_syscalls: false,
            log_security: true,
            log_lifecycle: true,
            log_ipc: true,
            log_state: true,
            log_resource: true,
            log_network: true,
            log_world: true,
        }
    }
}

impl AuditConfig {
    /// Whether entries of `category` pass the filter.
    #[must_use]
    pub fn accepts(&self, category: AuditCategory) -> bool {
        match category {
            AuditCategory::Syscall => self.log_syscalls,
            AuditCategory::Security => self.log_security,
            AuditCategory::AgentLifecycle => self.log_lifecycle,
            AuditCategory::Ipc => self.log_ipc,
            AuditCategory::State => self.log_state,
            AuditCategory::Resource => self.log_resource,
            AuditCategory::Network => self.log_network,
            AuditCategory::World => self.log_world,
        }
    }
}

/// Partial update for `SYS_SET_AUDIT_CONFIG`; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfigPatch {
    /// New ring capacity.
    pub max_entries: Option<usize>,
    /// Toggle syscall logging.
    pub log_syscalls: Option<bool>,
    /// Toggle security logging.
    pub log_security: Option<bool>,
    /// Toggle lifecycle logging.
    pub log_lifecycle: Option<bool>,
    /// Toggle IPC logging.
    pub log_ipc: Option<bool>,
    /// Toggle state logging.
    pub log_state: Option<bool>,
    /// Toggle resource logging.
    pub log_resource: Option<bool>,
    /// Toggle network logging.
    pub log_network: Option<bool>,
    /// Toggle world logging.
    pub log_world: Option<bool>,
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<AuditEntry>,
    next_id: u64,
    config: AuditConfig,
}

/// The bounded audit ring.
///
/// Ids are strictly increasing for the lifetime of the kernel even as old
/// entries fall off the ring, so `since_id` pagination never re-reads.
#[derive(Debug)]
pub struct AuditLog {
    inner: RwLock<Inner>,
}

impl AuditLog {
    /// Create a ring with the given filter configuration.
    #[must_use]
    pub fn new(config: AuditConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: VecDeque::new(),
                next_id: 1,
                config,
            }),
        }
    }

    /// Append an entry if its category passes the filter.
    ///
    /// Returns the assigned id, or `None` when filtered out.
    pub fn record(
        &self,
        category: AuditCategory,
        event_type: impl Into<String>,
        agent_id: Option<u32>,
        details: Value,
    ) -> Option<u64> {
        let mut inner = self.inner.write().expect("audit ring lock poisoned");
        if !inner.config.accepts(category) {
            return None;
        }
        let id = inner.next_id;
        inner.next_id = inner.next_id.saturating_add(1);
        let entry = AuditEntry {
            id,
            timestamp: Utc::now(),
            category,
            event_type: event_type.into(),
            agent_id,
            details,
        };
        trace!(id, category = category.as_str(), event_type = %entry.event_type, "Audit entry");
        inner.entries.push_back(entry);
        while inner.entries.len() > inner.config.max_entries {
            inner.entries.pop_front();
        }
        Some(id)
    }

    /// Query entries with id greater than `since_id`, optionally filtered by
    /// category and agent, capped at `limit`, in id order.
    #[must_use]
    pub fn query(
        &self,
        since_id: u64,
        category: Option<AuditCategory>,
        agent_id: Option<u32>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        let inner = self.inner.read().expect("audit ring lock poisoned");
        inner
            .entries
            .iter()
            .filter(|e| e.id > since_id)
            .filter(|e| category.is_none_or(|c| e.category == c))
            .filter(|e| agent_id.is_none_or(|a| e.agent_id == Some(a)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Current filter configuration.
    #[must_use]
    pub fn config(&self) -> AuditConfig {
        self.inner
            .read()
            .expect("audit ring lock poisoned")
            .config
            .clone()
    }

    /// Apply a partial config update atomically; returns the new config.
    pub fn apply(&self, patch: &AuditConfigPatch) -> AuditConfig {
        let mut inner = self.inner.write().expect("audit ring lock poisoned");
        let config = &mut inner.config;
        if let Some(v) = patch.max_entries {
            config.max_entries = v;
        }
        if let Some(v) = patch.log_syscalls {
            config.log_syscalls = v;
        }
        if let Some(v) = patch.log_security {
            config.log_security = v;
        }
        if let Some(v) = patch.log_lifecycle {
            config.log_lifecycle = v;
        }
        if let Some(v) = patch.log_ipc {
            config.log_ipc = v;
        }
        if let Some(v) = patch.log_state {
            config.log_state = v;
        }
        if let Some(v) = patch.log_resource {
            config.log_resource = v;
        }
        if let Some(v) = patch.log_network {
            config.log_network = v;
        }
        if let Some(v) = patch.log_world {
            config.log_world = v;
        }
        let updated = config.clone();
        while inner.entries.len() > updated.max_entries {
            inner.entries.pop_front();
        }
        updated
    }

    /// Number of entries currently in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("audit ring lock poisoned")
            .entries
            .len()
    }

    /// Whether the ring holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}
