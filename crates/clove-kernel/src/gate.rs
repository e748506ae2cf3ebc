//! The coarse permission gate applied before every handler.
//!
//! Fine-grained checks (path whitelists, exec allowlists, HTTP domains,
//! spawn/set-perms capability) live in the handlers; this gate implements
//! the level matrix: `minimal` sees only noop/think/introspection, and
//! `readonly` additionally loses every mutating opcode.

use clove_caps::Capabilities;
use clove_core::{SyscallError, SyscallResult};
use clove_protocol::Opcode;

pub(crate) fn check(caps: &Capabilities, op: Opcode) -> SyscallResult<()> {
    use Opcode as Op;

    // Available at every level.
    if matches!(op, Op::Noop | Op::Think | Op::GetPerms | Op::Exit) {
        return Ok(());
    }
    if !caps.allows_queries() {
        return Err(SyscallError::PermissionDenied);
    }

    let mutating = matches!(
        op,
        Op::Exec
            | Op::Write
            | Op::Spawn
            | Op::Kill
            | Op::Pause
            | Op::Resume
            | Op::Send
            | Op::Broadcast
            | Op::Register
            | Op::Store
            | Op::Delete
            | Op::SetPerms
            | Op::Emit
            | Op::WorldCreate
            | Op::WorldDestroy
            | Op::WorldJoin
            | Op::WorldLeave
            | Op::WorldEvent
            | Op::WorldRestore
            | Op::RecordStart
            | Op::RecordStop
            | Op::ReplayStart
            | Op::SetAuditConfig
    );
    if mutating && !caps.allows_mutation() {
        return Err(SyscallError::PermissionDenied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clove_caps::PermissionLevel;

    fn caps(level: PermissionLevel) -> Capabilities {
        Capabilities::from_level(level, "/tmp/clove")
    }

    #[test]
    fn test_minimal_matrix() {
        let minimal = caps(PermissionLevel::Minimal);
        assert!(check(&minimal, Opcode::Noop).is_ok());
        assert!(check(&minimal, Opcode::Think).is_ok());
        assert!(check(&minimal, Opcode::GetPerms).is_ok());
        assert!(check(&minimal, Opcode::Fetch).is_err());
        assert!(check(&minimal, Opcode::Recv).is_err());
        assert!(check(&minimal, Opcode::Read).is_err());
    }

    #[test]
    fn test_readonly_matrix() {
        let readonly = caps(PermissionLevel::Readonly);
        assert!(check(&readonly, Opcode::Read).is_ok());
        assert!(check(&readonly, Opcode::Fetch).is_ok());
        assert!(check(&readonly, Opcode::Keys).is_ok());
        assert!(check(&readonly, Opcode::Http).is_ok()); // method-gated in the handler
        assert!(check(&readonly, Opcode::PollEvents).is_ok());
        assert!(check(&readonly, Opcode::Store).is_err());
        assert!(check(&readonly, Opcode::Send).is_err());
        assert!(check(&readonly, Opcode::Spawn).is_err());
        assert!(check(&readonly, Opcode::SetAuditConfig).is_err());
    }

    #[test]
    fn test_standard_passes_gate() {
        let standard = caps(PermissionLevel::Standard);
        assert!(check(&standard, Opcode::Store).is_ok());
        assert!(check(&standard, Opcode::Send).is_ok());
        // Spawn passes the gate; the handler checks `can_spawn`.
        assert!(check(&standard, Opcode::Spawn).is_ok());
    }
}
