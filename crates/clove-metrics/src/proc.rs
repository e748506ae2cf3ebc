//! `/proc` parsers.
//!
//! Every parser takes the file content as a string so the formats are unit
//! testable without a live procfs.

/// Aggregate CPU jiffies from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CpuSample {
    pub(crate) busy: u64,
    pub(crate) total: u64,
}

impl CpuSample {
    /// CPU percent between two samples.
    pub(crate) fn percent_since(self, earlier: Self) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        #[allow(clippy::cast_precision_loss)]
        let percent = busy as f64 / total as f64 * 100.0;
        percent.clamp(0.0, 100.0)
    }
}

pub(crate) fn parse_stat(content: &str) -> Option<CpuSample> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    let idle = fields[3].saturating_add(*fields.get(4).unwrap_or(&0));
    Some(CpuSample {
        busy: total.saturating_sub(idle),
        total,
    })
}

pub(crate) fn parse_loadavg(content: &str) -> [f64; 3] {
    let mut parts = content.split_whitespace();
    let mut next = || parts.next().and_then(|p| p.parse().ok()).unwrap_or(0.0);
    [next(), next(), next()]
}

/// `(total_kb, used_kb, percent)` from `/proc/meminfo`.
pub(crate) fn parse_meminfo(content: &str) -> (u64, u64, f64) {
    let field = |name: &str| {
        content
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };
    let total = field("MemTotal:");
    let available = field("MemAvailable:");
    let used = total.saturating_sub(available);
    #[allow(clippy::cast_precision_loss)]
    let percent = if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    };
    (total, used, percent)
}

/// `(read_bytes, write_bytes)` summed over all devices in `/proc/diskstats`.
pub(crate) fn parse_diskstats(content: &str) -> (u64, u64) {
    const SECTOR_SIZE: u64 = 512;
    let mut read = 0u64;
    let mut written = 0u64;
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // Field layout: major minor name reads ... sectors_read(5) ... sectors_written(9)
        if fields.len() < 10 {
            continue;
        }
        // Skip partitions of loop/ram pseudo-devices.
        if fields[2].starts_with("loop") || fields[2].starts_with("ram") {
            continue;
        }
        let sectors_read: u64 = fields[5].parse().unwrap_or(0);
        let sectors_written: u64 = fields[9].parse().unwrap_or(0);
        read = read.saturating_add(sectors_read.saturating_mul(SECTOR_SIZE));
        written = written.saturating_add(sectors_written.saturating_mul(SECTOR_SIZE));
    }
    (read, written)
}

/// `(bytes_sent, bytes_recv)` summed over non-loopback interfaces in
/// `/proc/net/dev`.
pub(crate) fn parse_netdev(content: &str) -> (u64, u64) {
    let mut sent = 0u64;
    let mut received = 0u64;
    for line in content.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        if name.trim() == "lo" {
            continue;
        }
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        received = received.saturating_add(fields[0].parse().unwrap_or(0));
        sent = sent.saturating_add(fields[8].parse().unwrap_or(0));
    }
    (sent, received)
}

/// Per-process jiffies (utime + stime) and state char from `/proc/<pid>/stat`.
pub(crate) fn parse_pid_stat(content: &str) -> Option<(u64, char)> {
    // The command field is parenthesized and may contain spaces; parse from
    // the closing paren.
    let after_comm = content.rsplit_once(')').map(|(_, rest)| rest)?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // fields[0] is the state; utime/stime are fields 11 and 12 after comm.
    let state = fields.first()?.chars().next()?;
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some((utime.saturating_add(stime), state))
}

/// `VmRSS` in kB from `/proc/<pid>/status`.
pub(crate) fn parse_pid_rss(content: &str) -> u64 {
    content
        .lines()
        .find(|l| l.starts_with("VmRSS:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// `usage_usec` from a cgroup `cpu.stat`.
pub(crate) fn parse_cpu_stat_usage(content: &str) -> u64 {
    content
        .lines()
        .find(|l| l.starts_with("usage_usec"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// A cgroup limit file: a number, or `max` for unlimited.
pub(crate) fn parse_limit(content: &str) -> Option<u64> {
    let trimmed = content.trim();
    if trimmed == "max" {
        None
    } else {
        trimmed.parse().ok()
    }
}
