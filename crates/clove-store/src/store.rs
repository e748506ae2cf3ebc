//! The in-memory state store.

use clove_core::{AgentId, SyscallError, SyscallResult, WorldId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Record scope as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Visible to every session.
    Global,
    /// Private to one agent.
    Agent,
    /// Shared by sessions joined to one world.
    World,
}

impl Scope {
    /// Parse a wire scope string. Accepts both the short and the
    /// `-local`-suffixed spellings.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "global" => Some(Self::Global),
            "agent" | "agent-local" => Some(Self::Agent),
            "world" | "world-local" => Some(Self::World),
            _ => None,
        }
    }
}

/// Fully resolved owner of a record: scope plus the owning id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Global scope.
    Global,
    /// Agent-local scope.
    Agent(AgentId),
    /// World-local scope.
    World(WorldId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    owner: Owner,
    key: String,
}

#[derive(Debug)]
struct Record {
    value: Value,
    expires_at: Option<Instant>,
    /// Insertion sequence; `keys()` lists in this order.
    seq: u64,
}

impl Record {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<RecordKey, Record>,
    next_seq: u64,
}

/// The process-wide key/value store.
///
/// Every operation is a short critical section on one lock; writes are
/// atomic from any observer's perspective and reads never see a partially
/// written value.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<Inner>,
}

impl StateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a record. `ttl` is in seconds; `0` or `None` never expires.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a negative TTL.
    pub fn store(
        &self,
        owner: Owner,
        key: impl Into<String>,
        value: Value,
        ttl: Option<i64>,
    ) -> SyscallResult<()> {
        let expiry = match ttl {
            Some(secs) if secs < 0 => {
                return Err(SyscallError::bad_request("ttl must not be negative"));
            },
            Some(0) | None => None,
            #[allow(clippy::cast_sign_loss)]
            Some(secs) => Some(Duration::from_secs(secs as u64)),
        };
        self.store_with_expiry(owner, key, value, expiry);
        Ok(())
    }

    /// Upsert with an explicit expiry duration (`None` never expires).
    pub fn store_with_expiry(
        &self,
        owner: Owner,
        key: impl Into<String>,
        value: Value,
        expiry: Option<Duration>,
    ) {
        let key = RecordKey {
            owner,
            key: key.into(),
        };
        let now = Instant::now();
        let mut inner = self.inner.write().expect("state store lock poisoned");
        // Overwriting a live record keeps its position in key order.
        let live_seq = inner
            .records
            .get(&key)
            .filter(|existing| !existing.is_expired(now))
            .map(|existing| existing.seq);
        let seq = live_seq.unwrap_or_else(|| {
            let seq = inner.next_seq;
            inner.next_seq = inner.next_seq.wrapping_add(1);
            seq
        });
        trace!(key = %key.key, "Stored record");
        inner.records.insert(
            key,
            Record {
                value,
                expires_at: expiry.map(|d| now.checked_add(d).unwrap_or(now)),
                seq,
            },
        );
    }

    /// Fetch a record. Expired records are removed and reported absent.
    #[must_use]
    pub fn fetch(&self, owner: &Owner, key: &str) -> Option<Value> {
        let record_key = RecordKey {
            owner: owner.clone(),
            key: key.to_string(),
        };
        let now = Instant::now();
        let mut inner = self.inner.write().expect("state store lock poisoned");
        match inner.records.get(&record_key) {
            Some(record) if record.is_expired(now) => {
                inner.records.remove(&record_key);
                None
            },
            Some(record) => Some(record.value.clone()),
            None => None,
        }
    }

    /// Delete a record. Returns whether a live record was removed.
    pub fn delete(&self, owner: &Owner, key: &str) -> bool {
        let record_key = RecordKey {
            owner: owner.clone(),
            key: key.to_string(),
        };
        let now = Instant::now();
        let mut inner = self.inner.write().expect("state store lock poisoned");
        match inner.records.remove(&record_key) {
            Some(record) => !record.is_expired(now),
            None => false,
        }
    }

    /// List live keys for an owner in insertion order, optionally filtered
    /// by prefix.
    #[must_use]
    pub fn keys(&self, owner: &Owner, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let inner = self.inner.read().expect("state store lock poisoned");
        let mut live: Vec<(u64, &str)> = inner
            .records
            .iter()
            .filter(|(k, record)| {
                k.owner == *owner && !record.is_expired(now) && k.key.starts_with(prefix)
            })
            .map(|(k, record)| (record.seq, k.key.as_str()))
            .collect();
        live.sort_unstable_by_key(|(seq, _)| *seq);
        live.into_iter().map(|(_, k)| k.to_string()).collect()
    }

    /// Remove every expired record. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().expect("state store lock poisoned");
        let before = inner.records.len();
        inner.records.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(inner.records.len());
        if removed > 0 {
            debug!(removed, "Swept expired records");
        }
        removed
    }

    /// Number of records currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("state store lock poisoned").records.len()
    }

    /// Whether the store holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the periodic sweeper task.
    #[must_use]
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }
}
