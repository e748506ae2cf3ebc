//! Namespace isolation for sandboxed children.

// `pre_exec` runs between fork and exec and is inherently unsafe.
#![allow(unsafe_code)]

use nix::sched::{CloneFlags, unshare};
use tokio::process::Command;

/// Configure `cmd` to enter fresh namespaces before exec.
///
/// Mount, pid and uts namespaces are always unshared; the net namespace is
/// unshared too when `network` is false, which leaves the child with no
/// interfaces at all. The closure runs in the forked child, so a failed
/// `unshare` (no privilege, kernel without namespace support) surfaces as a
/// spawn error on the parent side.
pub(crate) fn isolate(cmd: &mut Command, network: bool) {
    let mut flags = CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWPID | CloneFlags::CLONE_NEWUTS;
    if !network {
        flags |= CloneFlags::CLONE_NEWNET;
    }

    unsafe {
        cmd.pre_exec(move || {
            unshare(flags).map_err(std::io::Error::from)?;
            Ok(())
        });
    }
}
