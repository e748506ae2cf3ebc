//! One simulated world.

use chrono::Utc;
use clove_core::{AgentId, SyscallError, SyscallResult, WorldId};
use serde_json::{Value, json};
use std::collections::BTreeSet;

use crate::chaos::{ChaosEngine, ChaosMetrics, FileOp};
use crate::config::WorldConfig;
use crate::net::{MockNet, MockResponse};
use crate::vfs::VirtualFs;

/// A world: config-derived overlays plus membership and counters.
///
/// Overlay methods return `None` when the world does not virtualize that
/// effector; the kernel then falls through to the real one.
#[derive(Debug)]
pub struct World {
    /// World id.
    pub id: WorldId,
    /// Human-readable name.
    pub name: String,
    config: WorldConfig,
    vfs: Option<VirtualFs>,
    net: Option<MockNet>,
    chaos: Option<ChaosEngine>,
    joined: BTreeSet<AgentId>,
    syscall_count: u64,
}

impl World {
    /// Build a world from config.
    #[must_use]
    pub fn new(id: WorldId, name: impl Into<String>, config: WorldConfig) -> Self {
        let vfs = config.virtual_filesystem.as_ref().map(VirtualFs::from_config);
        let net = config
            .network
            .as_ref()
            .filter(|n| n.mode == "mock")
            .map(MockNet::from_config);
        let chaos = config.chaos.as_ref().map(ChaosEngine::from_config);
        Self {
            id,
            name: name.into(),
            config,
            vfs,
            net,
            chaos,
            joined: BTreeSet::new(),
            syscall_count: 0,
        }
    }

    // -- Membership --

    /// Join a session to this world.
    pub fn join(&mut self, agent: AgentId) {
        self.joined.insert(agent);
    }

    /// Remove a session from this world.
    pub fn leave(&mut self, agent: AgentId) {
        self.joined.remove(&agent);
    }

    /// Whether any session is joined.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        !self.joined.is_empty()
    }

    // -- Overlay effectors --

    /// Read through the virtual filesystem.
    pub fn read_file(&mut self, path: &str) -> Option<SyscallResult<String>> {
        let vfs = self.vfs.as_ref()?;
        self.syscall_count = self.syscall_count.saturating_add(1);
        if let Some(chaos) = self.chaos.as_mut()
            && let Some(msg) = chaos.check_file(path, FileOp::Read)
        {
            return Some(Err(SyscallError::Unavailable(msg)));
        }
        Some(vfs.read(path).map(ToString::to_string))
    }

    /// Write through the virtual filesystem.
    pub fn write_file(
        &mut self,
        path: &str,
        content: &str,
        append: bool,
    ) -> Option<SyscallResult<usize>> {
        self.vfs.as_ref()?;
        self.syscall_count = self.syscall_count.saturating_add(1);
        if let Some(chaos) = self.chaos.as_mut()
            && let Some(msg) = chaos.check_file(path, FileOp::Write)
        {
            return Some(Err(SyscallError::Unavailable(msg)));
        }
        self.vfs
            .as_mut()
            .map(|vfs| vfs.write(path, content, append))
    }

    /// Resolve an HTTP request through the mock network.
    ///
    /// `Some(Ok(..))` is a mocked response (the caller sleeps its latency),
    /// `Some(Err(..))` a refused request, `None` a pass-through to the real
    /// network.
    pub fn resolve_http(&mut self, url: &str) -> Option<SyscallResult<MockResponse>> {
        let net = self.net.as_ref()?;
        self.syscall_count = self.syscall_count.saturating_add(1);
        if let Some(chaos) = self.chaos.as_mut()
            && chaos.network_failed()
        {
            return Some(Err(SyscallError::Unavailable(
                "network failure (chaos)".to_string(),
            )));
        }
        match net.resolve(url) {
            Some(response) => {
                let mut response = response.clone();
                if let Some(chaos) = self.chaos.as_mut() {
                    response.latency_ms =
                        response.latency_ms.saturating_add(chaos.draw_latency_ms());
                }
                Some(Ok(response))
            },
            None if net.fail_unmatched() => {
                Some(Err(SyscallError::not_found("no mock matches")))
            },
            None => None,
        }
    }

    /// Inject a chaos event.
    ///
    /// # Errors
    ///
    /// `Unavailable` when the world has no chaos engine, `BadRequest` for an
    /// unknown event type.
    pub fn inject_chaos(&mut self, event_type: &str) -> SyscallResult<()> {
        let Some(chaos) = self.chaos.as_mut() else {
            return Err(SyscallError::Unavailable(
                "world has no chaos engine".to_string(),
            ));
        };
        chaos.inject(event_type)
    }

    // -- Introspection --

    /// One-line summary for `SYS_WORLD_LIST`.
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "world_id": &self.id,
            "name": &self.name,
            "agents": self.joined.len(),
            "syscall_count": self.syscall_count,
        })
    }

    /// Full state for `SYS_WORLD_STATE`.
    #[must_use]
    pub fn state(&self) -> Value {
        json!({
            "world_id": &self.id,
            "name": &self.name,
            "agents": self.joined.iter().map(|a| a.0).collect::<Vec<_>>(),
            "syscall_count": self.syscall_count,
            "chaos_metrics": self.chaos.as_ref().map(ChaosEngine::metrics),
            "file_count": self.vfs.as_ref().map_or(0, VirtualFs::file_count),
        })
    }

    /// Serializable capture of vfs, chaos metrics and syscall count.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "world_id": &self.id,
            "name": &self.name,
            "snapshot_time": Utc::now(),
            "config": &self.config,
            "vfs": &self.vfs,
            "chaos_metrics": self.chaos.as_ref().map(ChaosEngine::metrics),
            "syscall_count": self.syscall_count,
        })
    }

    /// Rebuild a world from a snapshot under a fresh id.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the snapshot is malformed.
    pub fn restore(snapshot: &Value, id: WorldId) -> SyscallResult<Self> {
        let name = snapshot
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("restored")
            .to_string();
        let config: WorldConfig = match snapshot.get("config") {
            Some(raw) if !raw.is_null() => serde_json::from_value(raw.clone())
                .map_err(|e| SyscallError::bad_request(format!("bad snapshot config: {e}")))?,
            _ => WorldConfig::default(),
        };
        let mut world = Self::new(id, name, config);

        if let Some(raw_vfs) = snapshot.get("vfs").filter(|v| !v.is_null()) {
            let vfs: VirtualFs = serde_json::from_value(raw_vfs.clone())
                .map_err(|e| SyscallError::bad_request(format!("bad snapshot vfs: {e}")))?;
            world.vfs = Some(vfs);
        }
        if let Some(raw_metrics) = snapshot.get("chaos_metrics").filter(|v| !v.is_null())
            && let Some(chaos) = world.chaos.as_mut()
        {
            let metrics: ChaosMetrics = serde_json::from_value(raw_metrics.clone())
                .map_err(|e| SyscallError::bad_request(format!("bad snapshot metrics: {e}")))?;
            chaos.set_metrics(metrics);
        }
        world.syscall_count = snapshot
            .get("syscall_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(world)
    }
}
