//! The kernel-owned world table.

use clove_core::{AgentId, SyscallError, SyscallResult, WorldId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::WorldConfig;
use crate::world::World;

#[derive(Debug, Default)]
struct Inner {
    worlds: HashMap<WorldId, World>,
    /// Which world each session is joined to. A session may belong to at
    /// most one world.
    membership: HashMap<AgentId, WorldId>,
}

/// Registry of live worlds plus session membership.
///
/// All operations are short critical sections; the world overlays are pure
/// in-memory computation, so nothing is held across I/O.
#[derive(Debug, Default)]
pub struct WorldRegistry {
    inner: Mutex<Inner>,
}

impl WorldRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world from a wire config object. Returns the new world id.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the config does not parse.
    pub fn create(&self, name: &str, raw_config: &Value) -> SyscallResult<WorldId> {
        let config = WorldConfig::from_value(raw_config)
            .map_err(|e| SyscallError::bad_request(format!("bad world config: {e}")))?;
        let id = WorldId::new(format!("{name}-{}", short_uuid()));
        let world = World::new(id.clone(), name, config);
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        inner.worlds.insert(id.clone(), world);
        info!(world_id = %id, name, "World created");
        Ok(id)
    }

    /// Destroy a world.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Conflict` while sessions are joined
    /// and `force` is false.
    pub fn destroy(&self, id: &str, force: bool) -> SyscallResult<()> {
        let id = WorldId::new(id);
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        let Some(world) = inner.worlds.get(&id) else {
            return Err(SyscallError::not_found(format!("unknown world: {id}")));
        };
        if world.is_occupied() && !force {
            return Err(SyscallError::Conflict(format!(
                "world {id} is occupied; use force to destroy"
            )));
        }
        inner.worlds.remove(&id);
        inner.membership.retain(|_, w| *w != id);
        info!(world_id = %id, force, "World destroyed");
        Ok(())
    }

    /// Join a session to a world.
    ///
    /// # Errors
    ///
    /// `Conflict` when the session is already joined somewhere, `NotFound`
    /// for an unknown world.
    pub fn join(&self, agent: AgentId, id: &str) -> SyscallResult<WorldId> {
        let id = WorldId::new(id);
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        if let Some(current) = inner.membership.get(&agent) {
            return Err(SyscallError::Conflict(format!(
                "already joined to world {current}"
            )));
        }
        let Some(world) = inner.worlds.get_mut(&id) else {
            return Err(SyscallError::not_found(format!("unknown world: {id}")));
        };
        world.join(agent);
        inner.membership.insert(agent, id.clone());
        debug!(%agent, world_id = %id, "Agent joined world");
        Ok(id)
    }

    /// Remove a session from its world.
    ///
    /// # Errors
    ///
    /// `NotFound` when the session is not joined anywhere.
    pub fn leave(&self, agent: AgentId) -> SyscallResult<WorldId> {
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        let Some(id) = inner.membership.remove(&agent) else {
            return Err(SyscallError::not_found("not joined to any world"));
        };
        if let Some(world) = inner.worlds.get_mut(&id) {
            world.leave(agent);
        }
        debug!(%agent, world_id = %id, "Agent left world");
        Ok(id)
    }

    /// Silently leave on session close.
    pub fn detach(&self, agent: AgentId) {
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        if let Some(id) = inner.membership.remove(&agent)
            && let Some(world) = inner.worlds.get_mut(&id)
        {
            world.leave(agent);
        }
    }

    /// The world a session is joined to, if any.
    #[must_use]
    pub fn world_of(&self, agent: AgentId) -> Option<WorldId> {
        self.inner
            .lock()
            .expect("world registry lock poisoned")
            .membership
            .get(&agent)
            .cloned()
    }

    /// Run `f` against the world the session is joined to.
    ///
    /// Returns `None` when the session is not in a world; the kernel then
    /// uses the real effector.
    pub fn with_member_world<R>(
        &self,
        agent: AgentId,
        f: impl FnOnce(&mut World) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        let id = inner.membership.get(&agent).cloned()?;
        inner.worlds.get_mut(&id).map(f)
    }

    /// Summaries of all live worlds.
    #[must_use]
    pub fn list(&self) -> Vec<Value> {
        self.inner
            .lock()
            .expect("world registry lock poisoned")
            .worlds
            .values()
            .map(World::summary)
            .collect()
    }

    /// Full state of one world.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn state(&self, id: &str) -> SyscallResult<Value> {
        let id = WorldId::new(id);
        let inner = self.inner.lock().expect("world registry lock poisoned");
        inner
            .worlds
            .get(&id)
            .map(World::state)
            .ok_or_else(|| SyscallError::not_found(format!("unknown world: {id}")))
    }

    /// Snapshot one world.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn snapshot(&self, id: &str) -> SyscallResult<Value> {
        let id = WorldId::new(id);
        let inner = self.inner.lock().expect("world registry lock poisoned");
        inner
            .worlds
            .get(&id)
            .map(World::snapshot)
            .ok_or_else(|| SyscallError::not_found(format!("unknown world: {id}")))
    }

    /// Reconstruct a world from a snapshot under a new id.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed snapshot, `Conflict` when the requested
    /// id is already live.
    pub fn restore(&self, snapshot: &Value, new_world_id: &str) -> SyscallResult<WorldId> {
        let id = if new_world_id.is_empty() {
            WorldId::new(format!("restored-{}", short_uuid()))
        } else {
            WorldId::new(new_world_id)
        };
        let world = World::restore(snapshot, id.clone())?;
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        if inner.worlds.contains_key(&id) {
            return Err(SyscallError::Conflict(format!(
                "world {id} already exists"
            )));
        }
        inner.worlds.insert(id.clone(), world);
        info!(world_id = %id, "World restored from snapshot");
        Ok(id)
    }

    /// Inject a chaos event into a world.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, plus the world's own injection errors.
    pub fn inject(&self, id: &str, event_type: &str) -> SyscallResult<()> {
        let id = WorldId::new(id);
        let mut inner = self.inner.lock().expect("world registry lock poisoned");
        let Some(world) = inner.worlds.get_mut(&id) else {
            return Err(SyscallError::not_found(format!("unknown world: {id}")));
        };
        world.inject_chaos(event_type)
    }
}

fn short_uuid() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..8].to_string()
}
