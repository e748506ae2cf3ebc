//! The IPC broker: registry, mailboxes, broadcast.

use clove_core::{AgentId, SyscallError, SyscallResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, trace};

/// Default mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

#[derive(Debug)]
struct QueuedMessage {
    from: AgentId,
    from_name: Option<String>,
    message: Value,
    enqueued_at: Instant,
}

/// A message as returned by `SYS_RECV`.
#[derive(Debug, Clone, Serialize)]
pub struct DrainedMessage {
    /// Sender agent id.
    pub from: u32,
    /// Sender's registered name at enqueue time, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    /// Message body.
    pub message: Value,
    /// Milliseconds the message spent queued.
    pub age_ms: u64,
}

/// Result of a broadcast.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastOutcome {
    /// Recipients whose mailbox accepted the message.
    pub delivered: usize,
    /// Recipients skipped because their mailbox was full.
    pub skipped_full: usize,
}

#[derive(Debug, Default)]
struct Inner {
    /// `name → id`; unique, first-writer-wins.
    names: HashMap<String, AgentId>,
    /// Reverse index for `from_name` stamping and release-on-close.
    ids: HashMap<AgentId, String>,
    /// One mailbox per live session.
    mailboxes: HashMap<AgentId, VecDeque<QueuedMessage>>,
}

/// The kernel-owned IPC broker.
///
/// All operations are short critical sections on a single lock; nothing is
/// held across I/O.
#[derive(Debug)]
pub struct IpcBroker {
    inner: RwLock<Inner>,
    mailbox_capacity: usize,
}

impl IpcBroker {
    /// Create a broker with the given per-mailbox capacity.
    #[must_use]
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            mailbox_capacity,
        }
    }

    /// Create a mailbox for a freshly accepted session.
    pub fn attach(&self, agent: AgentId) {
        let mut inner = self.inner.write().expect("ipc broker lock poisoned");
        inner.mailboxes.entry(agent).or_default();
    }

    /// Tear down a closing session: drop its mailbox and release its name.
    pub fn detach(&self, agent: AgentId) {
        let mut inner = self.inner.write().expect("ipc broker lock poisoned");
        inner.mailboxes.remove(&agent);
        if let Some(name) = inner.ids.remove(&agent) {
            inner.names.remove(&name);
            debug!(%agent, name, "Released agent name");
        }
    }

    /// Register a name for an agent.
    ///
    /// # Errors
    ///
    /// `Conflict` if the name is already taken by another live session.
    pub fn register(&self, agent: AgentId, name: &str) -> SyscallResult<()> {
        if name.is_empty() {
            return Err(SyscallError::bad_request("name must not be empty"));
        }
        let mut inner = self.inner.write().expect("ipc broker lock poisoned");
        match inner.names.get(name) {
            Some(owner) if *owner != agent => Err(SyscallError::Conflict(format!(
                "name '{name}' already registered"
            ))),
            _ => {
                // Re-registering under a new name releases the old one.
                if let Some(previous) = inner.ids.insert(agent, name.to_string()) {
                    inner.names.remove(&previous);
                }
                inner.names.insert(name.to_string(), agent);
                debug!(%agent, name, "Registered agent name");
                Ok(())
            },
        }
    }

    /// Resolve a registered name to an agent id.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<AgentId> {
        self.inner
            .read()
            .expect("ipc broker lock poisoned")
            .names
            .get(name)
            .copied()
    }

    /// The registered name of an agent, if any.
    #[must_use]
    pub fn name_of(&self, agent: AgentId) -> Option<String> {
        self.inner
            .read()
            .expect("ipc broker lock poisoned")
            .ids
            .get(&agent)
            .cloned()
    }

    /// Enqueue a message into `to`'s mailbox.
    ///
    /// # Errors
    ///
    /// `NotFound` when the recipient has no live session, `ResourceExhausted`
    /// when its mailbox is full.
    pub fn send(&self, from: AgentId, to: AgentId, message: Value) -> SyscallResult<()> {
        let mut inner = self.inner.write().expect("ipc broker lock poisoned");
        let from_name = inner.ids.get(&from).cloned();
        let Some(mailbox) = inner.mailboxes.get_mut(&to) else {
            return Err(SyscallError::not_found("unknown recipient"));
        };
        if mailbox.len() >= self.mailbox_capacity {
            return Err(SyscallError::ResourceExhausted("mailbox full".to_string()));
        }
        mailbox.push_back(QueuedMessage {
            from,
            from_name,
            message,
            enqueued_at: Instant::now(),
        });
        trace!(%from, %to, "Enqueued message");
        Ok(())
    }

    /// Drain up to `max` messages from `agent`'s mailbox in FIFO order.
    #[must_use]
    pub fn recv(&self, agent: AgentId, max: usize) -> Vec<DrainedMessage> {
        let now = Instant::now();
        let mut inner = self.inner.write().expect("ipc broker lock poisoned");
        let Some(mailbox) = inner.mailboxes.get_mut(&agent) else {
            return Vec::new();
        };
        let count = max.min(mailbox.len());
        mailbox
            .drain(..count)
            .map(|q| DrainedMessage {
                from: q.from.0,
                from_name: q.from_name,
                message: q.message,
                age_ms: u64::try_from(
                    now.saturating_duration_since(q.enqueued_at).as_millis(),
                )
                .unwrap_or(u64::MAX),
            })
            .collect()
    }

    /// Enqueue to every registered agent, optionally skipping the sender.
    ///
    /// Delivery is best-effort per recipient: full mailboxes are skipped and
    /// counted, never blocking the sender.
    #[must_use]
    pub fn broadcast(
        &self,
        from: AgentId,
        message: &Value,
        include_self: bool,
    ) -> BroadcastOutcome {
        let mut inner = self.inner.write().expect("ipc broker lock poisoned");
        let from_name = inner.ids.get(&from).cloned();
        let recipients: Vec<AgentId> = inner
            .names
            .values()
            .copied()
            .filter(|id| include_self || *id != from)
            .collect();

        let mut outcome = BroadcastOutcome {
            delivered: 0,
            skipped_full: 0,
        };
        let now = Instant::now();
        for id in recipients {
            let Some(mailbox) = inner.mailboxes.get_mut(&id) else {
                continue;
            };
            if mailbox.len() >= self.mailbox_capacity {
                outcome.skipped_full = outcome.skipped_full.saturating_add(1);
                continue;
            }
            mailbox.push_back(QueuedMessage {
                from,
                from_name: from_name.clone(),
                message: message.clone(),
                enqueued_at: now,
            });
            outcome.delivered = outcome.delivered.saturating_add(1);
        }
        outcome
    }

    /// Number of messages waiting in an agent's mailbox.
    #[must_use]
    pub fn pending(&self, agent: AgentId) -> usize {
        self.inner
            .read()
            .expect("ipc broker lock poisoned")
            .mailboxes
            .get(&agent)
            .map_or(0, VecDeque::len)
    }
}

impl Default for IpcBroker {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}
