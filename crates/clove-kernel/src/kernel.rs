//! Component wiring and the accept loop.

use clove_audit::{AuditConfig, AuditLog, Recorder, ReplayTracker};
use clove_caps::{Capabilities, PermissionLevel};
use clove_core::AgentId;
use clove_events::EventHub;
use clove_ipc::IpcBroker;
use clove_llm::{LlmConfig, LlmScheduler};
use clove_metrics::MetricsCollector;
use clove_store::StateStore;
use clove_supervisor::{Supervisor, SupervisorConfig};
use clove_world::WorldRegistry;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::config::KernelConfig;
use crate::session;

/// The kernel: every registry, broker, scheduler and tap, wired together.
///
/// Each component owns its data behind its own short-lived lock; the kernel
/// itself is shared as an `Arc` across connection tasks.
pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) store: Arc<StateStore>,
    pub(crate) ipc: Arc<IpcBroker>,
    pub(crate) events: Arc<EventHub>,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) recorder: Arc<Recorder>,
    pub(crate) replay: Arc<ReplayTracker>,
    pub(crate) llm: LlmScheduler,
    pub(crate) worlds: Arc<WorldRegistry>,
    pub(crate) supervisor: Arc<Supervisor>,
    pub(crate) metrics: MetricsCollector,
    pub(crate) http: reqwest::Client,
    /// Capability set per live session.
    sessions: RwLock<HashMap<AgentId, Capabilities>>,
    /// Shared id space for sessions and spawned children.
    next_agent_id: AtomicU32,
}

impl Kernel {
    /// Wire up all components and start the background tasks (LLM scheduler,
    /// store sweeper). Must run inside a tokio runtime.
    #[must_use]
    pub fn new(config: KernelConfig) -> Arc<Self> {
        let store = Arc::new(StateStore::new());
        let _sweeper = store.spawn_sweeper(Duration::from_secs(config.sweep_interval_s.max(1)));

        let events = Arc::new(EventHub::new(config.event_backlog));
        let audit = Arc::new(AuditLog::new(AuditConfig::default()));

        let mut llm_config = LlmConfig::new(config.llm.worker_command.clone());
        llm_config.request_timeout = Duration::from_secs(config.llm.request_timeout_s);
        llm_config.api_key = std::env::var("API_KEY").ok();
        let llm = LlmScheduler::start(llm_config);

        let supervisor = Arc::new(Supervisor::new(
            SupervisorConfig {
                interpreter: config.supervisor.interpreter.clone(),
                cgroup_root: config.supervisor.cgroup_root.clone(),
                kill_grace: Duration::from_secs(config.supervisor.kill_grace_s),
                backoff_base: Duration::from_secs(config.supervisor.backoff_base_s),
                backoff_cap: Duration::from_secs(config.supervisor.backoff_cap_s),
            },
            Arc::clone(&events),
            Arc::clone(&audit),
        ));

        Arc::new(Self {
            ipc: Arc::new(IpcBroker::new(config.mailbox_capacity)),
            store,
            events,
            audit,
            recorder: Arc::new(Recorder::new()),
            replay: Arc::new(ReplayTracker::new()),
            llm,
            worlds: Arc::new(WorldRegistry::new()),
            supervisor,
            metrics: MetricsCollector::new(),
            http: reqwest::Client::new(),
            sessions: RwLock::new(HashMap::new()),
            next_agent_id: AtomicU32::new(1),
            config,
        })
    }

    /// Bind the configured socket with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Bind failure is fatal: the kernel has nothing to serve without its
    /// socket.
    pub fn bind(&self) -> std::io::Result<UnixListener> {
        let path = &self.config.socket_path;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        info!(path = %path.display(), "Listening");
        Ok(listener)
    }

    /// Accept connections forever, one task per connection.
    pub async fn serve(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let kernel = Arc::clone(&self);
                    tokio::spawn(session::run_session(kernel, stream));
                },
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                },
            }
        }
    }

    // -- Session management --

    /// Allocate a bare agent id (shared with spawned children).
    pub(crate) fn allocate_agent_id(&self) -> AgentId {
        AgentId(self.next_agent_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate an id and attach the session to every per-session component.
    pub(crate) fn open_session(&self) -> AgentId {
        let id = self.allocate_agent_id();
        self.attach_session(id);
        id
    }

    /// Attach (or re-attach) session state for an id.
    pub(crate) fn attach_session(&self, id: AgentId) {
        self.ipc.attach(id);
        self.events.attach(id);
        let level = PermissionLevel::parse(&self.config.default_level)
            .unwrap_or(PermissionLevel::Standard);
        let caps = Capabilities::from_level(level, &self.config.working_area.to_string_lossy());
        self.sessions
            .write()
            .expect("session table lock poisoned")
            .entry(id)
            .or_insert(caps);
    }

    /// Whether an id currently has session state.
    pub(crate) fn has_session(&self, id: AgentId) -> bool {
        self.sessions
            .read()
            .expect("session table lock poisoned")
            .contains_key(&id)
    }

    /// Tear down a closed session. Children the session spawned keep
    /// running; the supervisor owns them.
    pub(crate) fn close_session(&self, id: AgentId) {
        self.ipc.detach(id);
        self.events.detach(id);
        self.worlds.detach(id);
        self.sessions
            .write()
            .expect("session table lock poisoned")
            .remove(&id);
        info!(agent = %id, "Session closed");
    }

    /// The session's current capability set.
    pub(crate) fn caps_of(&self, id: AgentId) -> Capabilities {
        let sessions = self.sessions.read().expect("session table lock poisoned");
        sessions.get(&id).cloned().unwrap_or_else(|| {
            Capabilities::from_level(
                PermissionLevel::Minimal,
                &self.config.working_area.to_string_lossy(),
            )
        })
    }

    /// Replace a session's capability set. Last writer wins.
    pub(crate) fn set_caps(&self, id: AgentId, caps: Capabilities) -> bool {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        match sessions.get_mut(&id) {
            Some(slot) => {
                *slot = caps;
                true
            },
            None => false,
        }
    }

    /// The working area path as a string, for capability derivation.
    pub(crate) fn working_area(&self) -> String {
        self.config.working_area.to_string_lossy().into_owned()
    }

    /// Default cgroup root, for `SYS_METRICS_CGROUP` without a path.
    pub(crate) fn default_cgroup_root(&self) -> PathBuf {
        self.config.supervisor.cgroup_root.clone()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session_count = self.sessions.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("Kernel")
            .field("sessions", &session_count)
            .field("socket_path", &self.config.socket_path)
            .finish_non_exhaustive()
    }
}
