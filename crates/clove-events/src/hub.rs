//! The event hub.

use chrono::{DateTime, Utc};
use clove_core::AgentId;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use tracing::trace;

/// Default per-session backlog capacity.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 256;

/// One event as delivered by `SYS_POLL_EVENTS`.
#[derive(Debug, Clone, Serialize)]
pub struct KernelEvent {
    /// Event type string.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: Value,
    /// Production time.
    pub at: DateTime<Utc>,
}

impl KernelEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct Subscription {
    mask: HashSet<String>,
    backlog: VecDeque<KernelEvent>,
}

/// The kernel-owned event hub.
#[derive(Debug)]
pub struct EventHub {
    sessions: RwLock<HashMap<AgentId, Subscription>>,
    backlog_capacity: usize,
}

impl EventHub {
    /// Create a hub with the given per-session backlog capacity.
    #[must_use]
    pub fn new(backlog_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            backlog_capacity,
        }
    }

    /// Track a freshly accepted session.
    pub fn attach(&self, agent: AgentId) {
        let mut sessions = self.sessions.write().expect("event hub lock poisoned");
        sessions.entry(agent).or_default();
    }

    /// Drop a closing session's mask and backlog.
    pub fn detach(&self, agent: AgentId) {
        let mut sessions = self.sessions.write().expect("event hub lock poisoned");
        sessions.remove(&agent);
    }

    /// Add event types to a session's mask; returns the resulting mask.
    #[must_use]
    pub fn subscribe(&self, agent: AgentId, event_types: &[String]) -> Vec<String> {
        let mut sessions = self.sessions.write().expect("event hub lock poisoned");
        let sub = sessions.entry(agent).or_default();
        for t in event_types {
            sub.mask.insert(t.clone());
        }
        let mut mask: Vec<String> = sub.mask.iter().cloned().collect();
        mask.sort_unstable();
        mask
    }

    /// Remove event types from a session's mask; returns the resulting mask.
    #[must_use]
    pub fn unsubscribe(&self, agent: AgentId, event_types: &[String]) -> Vec<String> {
        let mut sessions = self.sessions.write().expect("event hub lock poisoned");
        let sub = sessions.entry(agent).or_default();
        for t in event_types {
            sub.mask.remove(t);
        }
        let mut mask: Vec<String> = sub.mask.iter().cloned().collect();
        mask.sort_unstable();
        mask
    }

    /// Multicast an event to every session whose mask includes its type.
    ///
    /// Returns the number of sessions the event was queued for. A full
    /// backlog drops its oldest event to make room; production order within
    /// each backlog is preserved.
    pub fn publish(&self, event: &KernelEvent) -> usize {
        let mut sessions = self.sessions.write().expect("event hub lock poisoned");
        let mut delivered = 0usize;
        for sub in sessions.values_mut() {
            if !sub.mask.contains(&event.event_type) {
                continue;
            }
            if sub.backlog.len() >= self.backlog_capacity {
                sub.backlog.pop_front();
            }
            sub.backlog.push_back(event.clone());
            delivered = delivered.saturating_add(1);
        }
        trace!(event_type = %event.event_type, delivered, "Published event");
        delivered
    }

    /// Drain up to `max` queued events for a session, oldest first.
    #[must_use]
    pub fn poll(&self, agent: AgentId, max: usize) -> Vec<KernelEvent> {
        let mut sessions = self.sessions.write().expect("event hub lock poisoned");
        let Some(sub) = sessions.get_mut(&agent) else {
            return Vec::new();
        };
        let count = max.min(sub.backlog.len());
        sub.backlog.drain(..count).collect()
    }

    /// Number of events queued for a session.
    #[must_use]
    pub fn pending(&self, agent: AgentId) -> usize {
        self.sessions
            .read()
            .expect("event hub lock poisoned")
            .get(&agent)
            .map_or(0, |s| s.backlog.len())
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;
    use serde_json::json;

    #[test]
    fn test_publish_respects_mask() {
        let hub = EventHub::default();
        hub.attach(AgentId(1));
        hub.attach(AgentId(2));
        let _ = hub.subscribe(AgentId(1), &[types::AGENT_SPAWNED.to_string()]);

        let delivered = hub.publish(&KernelEvent::new(types::AGENT_SPAWNED, json!({"id": 5})));
        assert_eq!(delivered, 1);
        assert_eq!(hub.poll(AgentId(1), 10).len(), 1);
        assert!(hub.poll(AgentId(2), 10).is_empty());
    }

    #[test]
    fn test_subscribe_returns_sorted_mask() {
        let hub = EventHub::default();
        hub.attach(AgentId(1));
        let mask = hub.subscribe(
            AgentId(1),
            &["CUSTOM".to_string(), "AGENT_EXITED".to_string()],
        );
        assert_eq!(mask, vec!["AGENT_EXITED", "CUSTOM"]);
        let mask = hub.unsubscribe(AgentId(1), &["CUSTOM".to_string()]);
        assert_eq!(mask, vec!["AGENT_EXITED"]);
    }

    #[test]
    fn test_poll_preserves_production_order() {
        let hub = EventHub::default();
        hub.attach(AgentId(1));
        let _ = hub.subscribe(AgentId(1), &[types::CUSTOM.to_string()]);
        for n in 0..3 {
            hub.publish(&KernelEvent::new(types::CUSTOM, json!({"n": n})));
        }
        let events = hub.poll(AgentId(1), 2);
        assert_eq!(events[0].data, json!({"n": 0}));
        assert_eq!(events[1].data, json!({"n": 1}));
        assert_eq!(hub.pending(AgentId(1)), 1);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let hub = EventHub::new(2);
        hub.attach(AgentId(1));
        let _ = hub.subscribe(AgentId(1), &[types::CUSTOM.to_string()]);
        for n in 0..3 {
            hub.publish(&KernelEvent::new(types::CUSTOM, json!(n)));
        }
        let events = hub.poll(AgentId(1), 10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, json!(1));
        assert_eq!(events[1].data, json!(2));
    }

    #[test]
    fn test_detach_drops_state() {
        let hub = EventHub::default();
        hub.attach(AgentId(1));
        let _ = hub.subscribe(AgentId(1), &[types::CUSTOM.to_string()]);
        hub.publish(&KernelEvent::new(types::CUSTOM, json!(1)));
        hub.detach(AgentId(1));
        assert_eq!(hub.pending(AgentId(1)), 0);
        assert_eq!(
            hub.publish(&KernelEvent::new(types::CUSTOM, json!(2))),
            0
        );
    }

    #[test]
    fn test_event_wire_shape() {
        let event = KernelEvent::new("CUSTOM", json!({"k": 1}));
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "CUSTOM");
        assert_eq!(v["data"]["k"], 1);
        assert!(v["at"].is_string());
    }
}
