//! Cgroup v2 setup for sandboxed children.
//!
//! The kernel owns a root cgroup directory (configurable, e.g.
//! `/sys/fs/cgroup/clove`); each sandboxed child gets a fresh directory
//! under it with the spec's limits written before the child pid is moved in.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::spec::SpawnLimits;

/// CPU period used for `cpu.max`, in microseconds.
const CPU_PERIOD_USEC: u64 = 100_000;

/// A created cgroup directory; removed on [`CgroupScope::cleanup`].
#[derive(Debug, Clone)]
pub struct CgroupScope {
    path: PathBuf,
}

impl CgroupScope {
    /// Create `<root>/<stem>` and apply limits.
    ///
    /// # Errors
    ///
    /// Any I/O failure is surfaced; the caller treats it as a spawn error
    /// rather than running the child unconfined.
    pub fn create(root: &Path, stem: &str, limits: &SpawnLimits) -> io::Result<Self> {
        let path = root.join(stem);
        std::fs::create_dir_all(&path)?;

        if let Some(mb) = limits.memory_mb {
            let bytes = mb.saturating_mul(1024 * 1024);
            std::fs::write(path.join("memory.max"), format!("{bytes}\n"))?;
        }
        if let Some(percent) = limits.cpu_percent {
            let quota = u64::from(percent)
                .saturating_mul(CPU_PERIOD_USEC)
                .checked_div(100)
                .unwrap_or(CPU_PERIOD_USEC);
            std::fs::write(path.join("cpu.max"), format!("{quota} {CPU_PERIOD_USEC}\n"))?;
        }
        if let Some(pids) = limits.max_pids {
            std::fs::write(path.join("pids.max"), format!("{pids}\n"))?;
        }

        debug!(path = %path.display(), "Created cgroup");
        Ok(Self { path })
    }

    /// Move a process into this cgroup.
    ///
    /// # Errors
    ///
    /// Fails when the cgroup was removed or the pid is gone.
    pub fn add_process(&self, pid: u32) -> io::Result<()> {
        std::fs::write(self.path.join("cgroup.procs"), format!("{pid}\n"))
    }

    /// The cgroup directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the cgroup directory. Best-effort; a populated cgroup cannot
    /// be removed and is left for the next cleanup.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_dir(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove cgroup");
        }
    }
}
