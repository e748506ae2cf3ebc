//! The supervisor proper.

use clove_audit::{AuditCategory, AuditLog};
use clove_core::{AgentId, SyscallError, SyscallResult};
use clove_events::{EventHub, KernelEvent, types};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::cgroup::CgroupScope;
use crate::child::{AgentState, ChildInfo, ChildRecord};
use crate::sandbox;
use crate::spec::SpawnSpec;

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Interpreter prefix for agent scripts, e.g. `["/bin/sh"]` or
    /// `["/usr/bin/python3"]`.
    pub interpreter: Vec<String>,
    /// Root directory for per-child cgroups.
    pub cgroup_root: PathBuf,
    /// Delay between SIGTERM and SIGKILL on `SYS_KILL`.
    pub kill_grace: Duration,
    /// Backoff per restart attempt; attempt `n` waits `n * backoff_base`.
    pub backoff_base: Duration,
    /// Upper bound on the restart backoff.
    pub backoff_cap: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interpreter: vec!["/bin/sh".to_string()],
            cgroup_root: PathBuf::from("/sys/fs/cgroup/clove"),
            kill_grace: Duration::from_secs(2),
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(10),
        }
    }
}

/// The kernel-owned child agent supervisor.
pub struct Supervisor {
    config: SupervisorConfig,
    children: Arc<Mutex<HashMap<AgentId, Arc<ChildRecord>>>>,
    events: Arc<EventHub>,
    audit: Arc<AuditLog>,
}

impl Supervisor {
    /// Create a supervisor publishing to the given hub and audit ring.
    #[must_use]
    pub fn new(config: SupervisorConfig, events: Arc<EventHub>, audit: Arc<AuditLog>) -> Self {
        Self {
            config,
            children: Arc::new(Mutex::new(HashMap::new())),
            events,
            audit,
        }
    }

    /// Spawn a child under a freshly allocated agent id.
    ///
    /// Returns the `SYS_SPAWN` response body.
    ///
    /// # Errors
    ///
    /// `Conflict` for a duplicate live name, `Unavailable` when requested
    /// isolation cannot be set up, `Internal` for spawn plumbing failures.
    pub fn spawn(&self, id: AgentId, spec: SpawnSpec) -> SyscallResult<Value> {
        {
            let children = self.children.lock().expect("children lock poisoned");
            let duplicate = children
                .values()
                .any(|c| c.spec.name == spec.name && !c.state().is_final());
            if duplicate {
                return Err(SyscallError::Conflict(format!(
                    "agent '{}' already running",
                    spec.name
                )));
            }
        }

        let cgroup = if spec.sandboxed && spec.limits.any() {
            let stem = format!("{}-{}", spec.name, id.0);
            Some(
                CgroupScope::create(&self.config.cgroup_root, &stem, &spec.limits).map_err(
                    |e| SyscallError::Unavailable(format!("cgroup setup failed: {e}")),
                )?,
            )
        } else {
            None
        };

        let child = match launch(&self.config.interpreter, &spec) {
            Ok(child) => child,
            Err(e) => {
                if let Some(scope) = &cgroup {
                    scope.cleanup();
                }
                return Err(SyscallError::Unavailable(format!("spawn failed: {e}")));
            },
        };
        let Some(pid) = child.id() else {
            if let Some(scope) = &cgroup {
                scope.cleanup();
            }
            return Err(SyscallError::Internal("spawned child has no pid".to_string()));
        };

        if let Some(scope) = &cgroup
            && let Err(e) = scope.add_process(pid)
        {
            let _ = signal_pid(pid, Signal::SIGKILL);
            scope.cleanup();
            return Err(SyscallError::Unavailable(format!(
                "cgroup attach failed: {e}"
            )));
        }

        let record = Arc::new(ChildRecord::new(id, spec, pid, cgroup));
        {
            let mut children = self.children.lock().expect("children lock poisoned");
            children.insert(id, Arc::clone(&record));
        }

        info!(%id, name = %record.spec.name, pid, "Agent spawned");
        self.events.publish(&KernelEvent::new(
            types::AGENT_SPAWNED,
            json!({"id": id.0, "name": &record.spec.name, "pid": pid}),
        ));
        self.audit.record(
            AuditCategory::AgentLifecycle,
            types::AGENT_SPAWNED,
            Some(id.0),
            json!({"name": &record.spec.name, "pid": pid, "sandboxed": record.spec.sandboxed}),
        );

        tokio::spawn(monitor(
            MonitorCtx {
                record: Arc::clone(&record),
                events: Arc::clone(&self.events),
                audit: Arc::clone(&self.audit),
                interpreter: self.config.interpreter.clone(),
                backoff_base: self.config.backoff_base,
                backoff_cap: self.config.backoff_cap,
            },
            child,
        ));

        Ok(json!({
            "success": true,
            "id": id.0,
            "pid": pid,
            "status": "RUNNING",
            "restart_policy": record.spec.restart_policy.as_str(),
        }))
    }

    /// Resolve a kill/pause/resume target by id or name.
    fn resolve(&self, id: Option<u32>, name: Option<&str>) -> SyscallResult<Arc<ChildRecord>> {
        let children = self.children.lock().expect("children lock poisoned");
        let found = match (id, name) {
            (Some(id), _) => children.get(&AgentId(id)).cloned(),
            (None, Some(name)) => children
                .values()
                .filter(|c| c.spec.name == name)
                .max_by_key(|c| !c.state().is_final())
                .cloned(),
            (None, None) => {
                return Err(SyscallError::bad_request("id or name required"));
            },
        };
        found.ok_or_else(|| SyscallError::not_found("unknown agent"))
    }

    /// `SYS_KILL`: SIGTERM, grace period, SIGKILL.
    ///
    /// # Errors
    ///
    /// `NotFound` / `BadRequest` for an unresolvable target.
    pub async fn kill(&self, id: Option<u32>, name: Option<&str>) -> SyscallResult<bool> {
        let record = self.resolve(id, name)?;
        if record.state().is_final() {
            return Ok(false);
        }
        // Mark stopped first so the monitor treats the exit as final.
        record.set_state(AgentState::Stopped);
        let pid = record.pid.load(Ordering::Relaxed);
        let _ = signal_pid(pid, Signal::SIGTERM);

        let grace = self.config.kill_grace;
        tokio::time::sleep(grace).await;
        if is_alive(pid) {
            let _ = signal_pid(pid, Signal::SIGKILL);
        }

        info!(id = record.id.0, name = %record.spec.name, "Agent killed");
        self.events.publish(&KernelEvent::new(
            types::AGENT_KILLED,
            json!({"id": record.id.0, "name": &record.spec.name}),
        ));
        self.audit.record(
            AuditCategory::AgentLifecycle,
            types::AGENT_KILLED,
            Some(record.id.0),
            json!({"name": &record.spec.name}),
        );
        Ok(true)
    }

    /// `SYS_PAUSE`: SIGSTOP.
    ///
    /// # Errors
    ///
    /// `Conflict` when the child is not running.
    pub fn pause(&self, id: Option<u32>, name: Option<&str>) -> SyscallResult<()> {
        let record = self.resolve(id, name)?;
        if !record.transition(AgentState::Running, AgentState::Paused) {
            return Err(SyscallError::Conflict("agent is not running".to_string()));
        }
        let pid = record.pid.load(Ordering::Relaxed);
        signal_pid(pid, Signal::SIGSTOP)
            .map_err(|e| SyscallError::Internal(format!("SIGSTOP failed: {e}")))?;
        self.events.publish(&KernelEvent::new(
            types::AGENT_PAUSED,
            json!({"id": record.id.0, "name": &record.spec.name}),
        ));
        self.audit.record(
            AuditCategory::AgentLifecycle,
            types::AGENT_PAUSED,
            Some(record.id.0),
            json!({"name": &record.spec.name}),
        );
        Ok(())
    }

    /// `SYS_RESUME`: SIGCONT.
    ///
    /// # Errors
    ///
    /// `Conflict` when the child is not paused.
    pub fn resume(&self, id: Option<u32>, name: Option<&str>) -> SyscallResult<()> {
        let record = self.resolve(id, name)?;
        if !record.transition(AgentState::Paused, AgentState::Running) {
            return Err(SyscallError::Conflict("agent is not paused".to_string()));
        }
        let pid = record.pid.load(Ordering::Relaxed);
        signal_pid(pid, Signal::SIGCONT)
            .map_err(|e| SyscallError::Internal(format!("SIGCONT failed: {e}")))?;
        self.events.publish(&KernelEvent::new(
            types::AGENT_RESUMED,
            json!({"id": record.id.0, "name": &record.spec.name}),
        ));
        self.audit.record(
            AuditCategory::AgentLifecycle,
            types::AGENT_RESUMED,
            Some(record.id.0),
            json!({"name": &record.spec.name}),
        );
        Ok(())
    }

    /// `SYS_LIST`: every known child, live and final.
    #[must_use]
    pub fn list(&self) -> Vec<ChildInfo> {
        let children = self.children.lock().expect("children lock poisoned");
        let mut infos: Vec<ChildInfo> = children.values().map(|c| c.info()).collect();
        infos.sort_unstable_by_key(|i| i.id);
        infos
    }

    /// Pid of a child, for the metrics sampler.
    #[must_use]
    pub fn pid_of(&self, id: AgentId) -> Option<u32> {
        let children = self.children.lock().expect("children lock poisoned");
        children.get(&id).map(|c| c.pid.load(Ordering::Relaxed))
    }

    /// Cgroup directory of a child, for the metrics sampler.
    #[must_use]
    pub fn cgroup_of(&self, id: AgentId) -> Option<PathBuf> {
        let children = self.children.lock().expect("children lock poisoned");
        children
            .get(&id)
            .and_then(|c| c.cgroup.as_ref().map(|s| s.path().to_path_buf()))
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.children.lock().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("Supervisor")
            .field("children", &count)
            .finish_non_exhaustive()
    }
}

/// Launch the child process.
fn launch(interpreter: &[String], spec: &SpawnSpec) -> std::io::Result<Child> {
    let Some((program, args)) = interpreter.split_first() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty interpreter",
        ));
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(&spec.script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if spec.sandboxed {
        sandbox::isolate(&mut cmd, spec.network);
    }
    cmd.spawn()
}

fn signal_pid(pid: u32, sig: Signal) -> nix::Result<()> {
    #[allow(clippy::cast_possible_wrap)]
    kill(Pid::from_raw(pid as i32), sig)
}

fn is_alive(pid: u32) -> bool {
    #[allow(clippy::cast_possible_wrap)]
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

struct MonitorCtx {
    record: Arc<ChildRecord>,
    events: Arc<EventHub>,
    audit: Arc<AuditLog>,
    interpreter: Vec<String>,
    backoff_base: Duration,
    backoff_cap: Duration,
}

/// Per-child monitor: wait for exit, apply the restart policy, escalate
/// when the budget is exhausted.
async fn monitor(ctx: MonitorCtx, mut child: Child) {
    let mut attempt: u32 = 0;
    loop {
        let incarnation_started = Instant::now();
        let status = child.wait().await;
        let exit_code = status
            .ok()
            .and_then(|s| s.code())
            .unwrap_or(-1);
        let uptime = incarnation_started.elapsed();

        let was_stopped = ctx.record.state() == AgentState::Stopped;
        let wants_restart =
            !was_stopped && ctx.record.spec.restart_policy.should_restart(exit_code);

        // Settle the restart budget before emitting anything: the exit that
        // exhausts it becomes AGENT_ESCALATED, not another
        // AGENT_EXITED/AGENT_RESTARTING pair.
        if wants_restart {
            // A long-lived incarnation earns a fresh restart budget.
            if uptime.as_secs() > ctx.record.spec.restart_window {
                attempt = 0;
            }
            attempt = attempt.saturating_add(1);

            if attempt > ctx.record.spec.max_restarts {
                ctx.record.set_state(AgentState::Escalated);
                warn!(
                    id = ctx.record.id.0,
                    name = %ctx.record.spec.name,
                    restarts = attempt.saturating_sub(1),
                    "Agent escalated"
                );
                ctx.events.publish(&KernelEvent::new(
                    types::AGENT_ESCALATED,
                    json!({
                        "id": ctx.record.id.0,
                        "name": &ctx.record.spec.name,
                        "restarts": attempt.saturating_sub(1),
                    }),
                ));
                ctx.audit.record(
                    AuditCategory::AgentLifecycle,
                    types::AGENT_ESCALATED,
                    Some(ctx.record.id.0),
                    json!({"name": &ctx.record.spec.name}),
                );
                break;
            }
        }

        if !was_stopped {
            ctx.record.set_state(AgentState::Exited(exit_code));
        }

        ctx.events.publish(&KernelEvent::new(
            types::AGENT_EXITED,
            json!({
                "id": ctx.record.id.0,
                "name": &ctx.record.spec.name,
                "exit_code": exit_code,
            }),
        ));
        ctx.audit.record(
            AuditCategory::AgentLifecycle,
            types::AGENT_EXITED,
            Some(ctx.record.id.0),
            json!({"name": &ctx.record.spec.name, "exit_code": exit_code}),
        );

        if !wants_restart {
            break;
        }

        let backoff = ctx
            .backoff_base
            .saturating_mul(attempt)
            .min(ctx.backoff_cap);
        ctx.record.set_state(AgentState::RestartWait);
        ctx.events.publish(&KernelEvent::new(
            types::AGENT_RESTARTING,
            json!({
                "id": ctx.record.id.0,
                "name": &ctx.record.spec.name,
                "attempt": attempt,
                "backoff_ms": u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            }),
        ));
        ctx.audit.record(
            AuditCategory::AgentLifecycle,
            types::AGENT_RESTARTING,
            Some(ctx.record.id.0),
            json!({"name": &ctx.record.spec.name, "attempt": attempt}),
        );
        tokio::time::sleep(backoff).await;

        // A kill during the backoff is final.
        if ctx.record.state() == AgentState::Stopped {
            break;
        }

        match launch(&ctx.interpreter, &ctx.record.spec) {
            Ok(new_child) => {
                let pid = new_child.id().unwrap_or(0);
                if let Some(scope) = &ctx.record.cgroup
                    && let Err(e) = scope.add_process(pid)
                {
                    warn!(pid, error = %e, "Failed to re-attach restarted child to cgroup");
                }
                ctx.record.pid.store(pid, Ordering::Relaxed);
                ctx.record.set_state(AgentState::Running);
                ctx.record.restart_count.fetch_add(1, Ordering::Relaxed);
                *ctx.record
                    .incarnation_started
                    .lock()
                    .expect("child clock lock poisoned") = Instant::now();
                child = new_child;
            },
            Err(e) => {
                warn!(
                    id = ctx.record.id.0,
                    name = %ctx.record.spec.name,
                    error = %e,
                    "Restart spawn failed; escalating"
                );
                ctx.record.set_state(AgentState::Escalated);
                ctx.events.publish(&KernelEvent::new(
                    types::AGENT_ESCALATED,
                    json!({
                        "id": ctx.record.id.0,
                        "name": &ctx.record.spec.name,
                        "error": e.to_string(),
                    }),
                ));
                break;
            },
        }
    }

    // The child reached a final state; its cgroup can go.
    if let Some(scope) = &ctx.record.cgroup {
        scope.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{RestartPolicy, SpawnLimits};
    use std::io::Write;

    fn test_supervisor(events: Arc<EventHub>) -> Supervisor {
        let config = SupervisorConfig {
            interpreter: vec!["/bin/sh".to_string()],
            cgroup_root: PathBuf::from("/tmp/clove-test-cgroup"),
            kill_grace: Duration::from_millis(100),
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(50),
        };
        Supervisor::new(config, events, Arc::new(AuditLog::default()))
    }

    fn script(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{body}").unwrap();
        path.display().to_string()
    }

    fn spec(name: &str, script: String, policy: RestartPolicy, max_restarts: u32) -> SpawnSpec {
        SpawnSpec {
            name: name.to_string(),
            script,
            sandboxed: false,
            network: false,
            limits: SpawnLimits::default(),
            restart_policy: policy,
            max_restarts,
            restart_window: 60,
        }
    }

    #[tokio::test]
    async fn test_spawn_list_kill() {
        let events = Arc::new(EventHub::default());
        let supervisor = test_supervisor(Arc::clone(&events));
        let dir = tempfile::tempdir().unwrap();
        let script = script(&dir, "sleeper.sh", "sleep 30");

        let response = supervisor
            .spawn(AgentId(10), spec("sleeper", script, RestartPolicy::Never, 0))
            .unwrap();
        assert_eq!(response["success"], true);
        assert_eq!(response["id"], 10);

        let infos = supervisor.list();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].state, "RUNNING");

        let killed = supervisor.kill(Some(10), None).await.unwrap();
        assert!(killed);
        assert_eq!(supervisor.list()[0].state, "STOPPED");
        // A second kill is a no-op.
        assert!(!supervisor.kill(Some(10), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflict() {
        let events = Arc::new(EventHub::default());
        let supervisor = test_supervisor(Arc::clone(&events));
        let dir = tempfile::tempdir().unwrap();
        let script = script(&dir, "sleeper.sh", "sleep 30");

        supervisor
            .spawn(AgentId(1), spec("dup", script.clone(), RestartPolicy::Never, 0))
            .unwrap();
        let err = supervisor
            .spawn(AgentId(2), spec("dup", script, RestartPolicy::Never, 0))
            .unwrap_err();
        assert!(matches!(err, SyscallError::Conflict(_)));
        supervisor.kill(Some(1), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_resume_transitions() {
        let events = Arc::new(EventHub::default());
        let supervisor = test_supervisor(Arc::clone(&events));
        let dir = tempfile::tempdir().unwrap();
        let script = script(&dir, "sleeper.sh", "sleep 30");

        supervisor
            .spawn(AgentId(1), spec("pausable", script, RestartPolicy::Never, 0))
            .unwrap();

        supervisor.pause(None, Some("pausable")).unwrap();
        assert_eq!(supervisor.list()[0].state, "PAUSED");
        // Pausing twice conflicts.
        assert!(matches!(
            supervisor.pause(Some(1), None),
            Err(SyscallError::Conflict(_))
        ));
        supervisor.resume(Some(1), None).unwrap();
        assert_eq!(supervisor.list()[0].state, "RUNNING");
        supervisor.kill(Some(1), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_on_failure_escalates_after_budget() {
        let events = Arc::new(EventHub::default());
        let observer = AgentId(999);
        events.attach(observer);
        let _ = events.subscribe(
            observer,
            &[
                types::AGENT_SPAWNED.to_string(),
                types::AGENT_EXITED.to_string(),
                types::AGENT_RESTARTING.to_string(),
                types::AGENT_ESCALATED.to_string(),
            ],
        );
        let supervisor = test_supervisor(Arc::clone(&events));
        let dir = tempfile::tempdir().unwrap();
        let script = script(&dir, "flaky.sh", "exit 1");

        supervisor
            .spawn(AgentId(5), spec("flaky", script, RestartPolicy::OnFailure, 3))
            .unwrap();

        // Wait for escalation.
        let deadline = Instant::now() + Duration::from_secs(5);
        while supervisor.list()[0].state != "ESCALATED" {
            assert!(Instant::now() < deadline, "never escalated");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let seen: Vec<String> = events
            .poll(observer, 100)
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        // Exactly SPAWNED, (EXITED, RESTARTING) x max_restarts, ESCALATED.
        let mut expected = vec![types::AGENT_SPAWNED];
        for _ in 0..3 {
            expected.push(types::AGENT_EXITED);
            expected.push(types::AGENT_RESTARTING);
        }
        expected.push(types::AGENT_ESCALATED);
        let seen_refs: Vec<&str> = seen.iter().map(String::as_str).collect();
        assert_eq!(seen_refs, expected);
        // The over-budget exit escalates directly: RESTARTING, not another
        // EXITED, precedes the escalation.
        assert_eq!(seen[seen.len() - 2], types::AGENT_RESTARTING);
        assert_eq!(
            seen.iter().filter(|t| *t == types::AGENT_EXITED).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_zero_exit_with_on_failure_is_final() {
        let events = Arc::new(EventHub::default());
        let supervisor = test_supervisor(Arc::clone(&events));
        let dir = tempfile::tempdir().unwrap();
        let script = script(&dir, "clean.sh", "exit 0");

        supervisor
            .spawn(AgentId(6), spec("clean", script, RestartPolicy::OnFailure, 3))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let infos = supervisor.list();
            if infos[0].state == "EXITED" {
                assert_eq!(infos[0].restart_count, 0);
                break;
            }
            assert!(Instant::now() < deadline, "never exited");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
