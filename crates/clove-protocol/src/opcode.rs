//! The syscall opcode registry.

use serde::{Deserialize, Serialize};

/// Numeric operation code carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Noop = 0x00,
    Think = 0x01,
    Exec = 0x02,
    Read = 0x03,
    Write = 0x04,

    Spawn = 0x10,
    Kill = 0x11,
    List = 0x12,
    Pause = 0x14,
    Resume = 0x15,

    Send = 0x20,
    Recv = 0x21,
    Broadcast = 0x22,
    Register = 0x23,

    Store = 0x30,
    Fetch = 0x31,
    Delete = 0x32,
    Keys = 0x33,

    GetPerms = 0x40,
    SetPerms = 0x41,

    Http = 0x50,

    Subscribe = 0x60,
    Unsubscribe = 0x61,
    PollEvents = 0x62,
    Emit = 0x63,

    RecordStart = 0x70,
    RecordStop = 0x71,
    RecordStatus = 0x72,
    ReplayStart = 0x73,
    ReplayStatus = 0x74,
    GetAuditLog = 0x76,
    SetAuditConfig = 0x77,

    WorldCreate = 0xA0,
    WorldDestroy = 0xA1,
    WorldList = 0xA2,
    WorldJoin = 0xA3,
    WorldLeave = 0xA4,
    WorldEvent = 0xA5,
    WorldState = 0xA6,
    WorldSnapshot = 0xA7,
    WorldRestore = 0xA8,

    TunnelConnect = 0xB0,
    TunnelDisconnect = 0xB1,
    TunnelStatus = 0xB2,
    TunnelListRemotes = 0xB3,
    TunnelConfig = 0xB4,

    MetricsSystem = 0xC0,
    MetricsAgent = 0xC1,
    MetricsAllAgents = 0xC2,
    MetricsCgroup = 0xC3,

    Exit = 0xFF,
}

impl Opcode {
    /// Resolve a raw opcode byte, `None` for unknown opcodes.
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x00 => Self::Noop,
            0x01 => Self::Think,
            0x02 => Self::Exec,
            0x03 => Self::Read,
            0x04 => Self::Write,
            0x10 => Self::Spawn,
            0x11 => Self::Kill,
            0x12 => Self::List,
            0x14 => Self::Pause,
            0x15 => Self::Resume,
            0x20 => Self::Send,
            0x21 => Self::Recv,
            0x22 => Self::Broadcast,
            0x23 => Self::Register,
            0x30 => Self::Store,
            0x31 => Self::Fetch,
            0x32 => Self::Delete,
            0x33 => Self::Keys,
            0x40 => Self::GetPerms,
            0x41 => Self::SetPerms,
            0x50 => Self::Http,
            0x60 => Self::Subscribe,
            0x61 => Self::Unsubscribe,
            0x62 => Self::PollEvents,
            0x63 => Self::Emit,
            0x70 => Self::RecordStart,
            0x71 => Self::RecordStop,
            0x72 => Self::RecordStatus,
            0x73 => Self::ReplayStart,
            0x74 => Self::ReplayStatus,
            0x76 => Self::GetAuditLog,
            0x77 => Self::SetAuditConfig,
            0xA0 => Self::WorldCreate,
            0xA1 => Self::WorldDestroy,
            0xA2 => Self::WorldList,
            0xA3 => Self::WorldJoin,
            0xA4 => Self::WorldLeave,
            0xA5 => Self::WorldEvent,
            0xA6 => Self::WorldState,
            0xA7 => Self::WorldSnapshot,
            0xA8 => Self::WorldRestore,
            0xB0 => Self::TunnelConnect,
            0xB1 => Self::TunnelDisconnect,
            0xB2 => Self::TunnelStatus,
            0xB3 => Self::TunnelListRemotes,
            0xB4 => Self::TunnelConfig,
            0xC0 => Self::MetricsSystem,
            0xC1 => Self::MetricsAgent,
            0xC2 => Self::MetricsAllAgents,
            0xC3 => Self::MetricsCgroup,
            0xFF => Self::Exit,
            _ => return None,
        })
    }

    /// The `SYS_*` name used in recordings and audit entries.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Noop => "SYS_NOOP",
            Self::Think => "SYS_THINK",
            Self::Exec => "SYS_EXEC",
            Self::Read => "SYS_READ",
            Self::Write => "SYS_WRITE",
            Self::Spawn => "SYS_SPAWN",
            Self::Kill => "SYS_KILL",
            Self::List => "SYS_LIST",
            Self::Pause => "SYS_PAUSE",
            Self::Resume => "SYS_RESUME",
            Self::Send => "SYS_SEND",
            Self::Recv => "SYS_RECV",
            Self::Broadcast => "SYS_BROADCAST",
            Self::Register => "SYS_REGISTER",
            Self::Store => "SYS_STORE",
            Self::Fetch => "SYS_FETCH",
            Self::Delete => "SYS_DELETE",
            Self::Keys => "SYS_KEYS",
            Self::GetPerms => "SYS_GET_PERMS",
            Self::SetPerms => "SYS_SET_PERMS",
            Self::Http => "SYS_HTTP",
            Self::Subscribe => "SYS_SUBSCRIBE",
            Self::Unsubscribe => "SYS_UNSUBSCRIBE",
            Self::PollEvents => "SYS_POLL_EVENTS",
            Self::Emit => "SYS_EMIT",
            Self::RecordStart => "SYS_RECORD_START",
            Self::RecordStop => "SYS_RECORD_STOP",
            Self::RecordStatus => "SYS_RECORD_STATUS",
            Self::ReplayStart => "SYS_REPLAY_START",
            Self::ReplayStatus => "SYS_REPLAY_STATUS",
            Self::GetAuditLog => "SYS_GET_AUDIT_LOG",
            Self::SetAuditConfig => "SYS_SET_AUDIT_CONFIG",
            Self::WorldCreate => "SYS_WORLD_CREATE",
            Self::WorldDestroy => "SYS_WORLD_DESTROY",
            Self::WorldList => "SYS_WORLD_LIST",
            Self::WorldJoin => "SYS_WORLD_JOIN",
            Self::WorldLeave => "SYS_WORLD_LEAVE",
            Self::WorldEvent => "SYS_WORLD_EVENT",
            Self::WorldState => "SYS_WORLD_STATE",
            Self::WorldSnapshot => "SYS_WORLD_SNAPSHOT",
            Self::WorldRestore => "SYS_WORLD_RESTORE",
            Self::TunnelConnect => "SYS_TUNNEL_CONNECT",
            Self::TunnelDisconnect => "SYS_TUNNEL_DISCONNECT",
            Self::TunnelStatus => "SYS_TUNNEL_STATUS",
            Self::TunnelListRemotes => "SYS_TUNNEL_LIST_REMOTES",
            Self::TunnelConfig => "SYS_TUNNEL_CONFIG",
            Self::MetricsSystem => "SYS_METRICS_SYSTEM",
            Self::MetricsAgent => "SYS_METRICS_AGENT",
            Self::MetricsAllAgents => "SYS_METRICS_ALL_AGENTS",
            Self::MetricsCgroup => "SYS_METRICS_CGROUP",
            Self::Exit => "SYS_EXIT",
        }
    }

    /// Resolve a recorded `SYS_*` name back to an opcode.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        (0x00..=0xFF)
            .filter_map(Self::from_u8)
            .find(|op| op.name() == name)
    }

    /// Whether this opcode's effects depend on the outside world.
    ///
    /// Non-deterministic opcodes are excluded from recordings by default and
    /// skipped during replay.
    #[must_use]
    pub fn is_nondeterministic(self) -> bool {
        matches!(self, Self::Think | Self::Http | Self::Exec)
    }

    /// Whether the payload is opaque bytes rather than JSON.
    #[must_use]
    pub fn is_raw_payload(self) -> bool {
        matches!(self, Self::Noop)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_known() {
        for raw in 0x00..=0xFFu8 {
            if let Some(op) = Opcode::from_u8(raw) {
                assert_eq!(op as u8, raw);
                assert_eq!(Opcode::from_name(op.name()), Some(op));
            }
        }
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(Opcode::from_u8(0x13).is_none());
        assert!(Opcode::from_u8(0x75).is_none());
    }

    #[test]
    fn test_nondeterministic_set() {
        assert!(Opcode::Think.is_nondeterministic());
        assert!(Opcode::Http.is_nondeterministic());
        assert!(Opcode::Exec.is_nondeterministic());
        assert!(!Opcode::Store.is_nondeterministic());
    }
}
