//! Parsers for `/proc/<pid>/stat`, `/proc/<pid>/status` and friends.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::{Pid, Tid};

/// Fields of a `stat` line that livetrace uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub comm: String,
    pub parent_pid: u32,
    pub flags: u32,
    pub utime: u64,
    pub stime: u64,
    pub priority: i32,
}

/// Parse `/proc/<pid>/stat` (or `/proc/<pid>/task/<tid>/stat`).
///
/// Format: "pid (comm) state ppid pgrp session tty tpgid flags ...".
/// `comm` may itself contain spaces and parentheses, so fields are counted
/// from the last `)`.
pub fn parse_stat(stat_line: &str) -> Result<ProcStat> {
    let comm = extract_comm(stat_line)?;
    let close = stat_line.rfind(')').context("Invalid stat format")?;
    let rest: Vec<&str> = stat_line[close + 1..].split_whitespace().collect();
    if rest.len() < 17 {
        bail!("Truncated stat line ({} fields after comm)", rest.len());
    }

    Ok(ProcStat {
        comm,
        parent_pid: rest[1].parse().context("Invalid ppid")?,
        flags: rest[6].parse().context("Invalid flags")?,
        utime: rest[11].parse().context("Invalid utime")?,
        stime: rest[12].parse().context("Invalid stime")?,
        priority: rest[15].parse().context("Invalid priority")?,
    })
}

/// Extract command name from a `stat` line.
/// Format: "pid (comm) state ..."
pub fn extract_comm(stat_line: &str) -> Result<String> {
    let open = stat_line.find('(').context("Invalid stat format")?;
    let close = stat_line.rfind(')').context("Invalid stat format")?;
    if open >= close {
        bail!("Invalid stat format");
    }
    Ok(stat_line[open + 1..close].to_string())
}

/// Read a `kB` field such as `VmRSS:     1234 kB` from `/proc/<pid>/status`,
/// returned in bytes.
#[must_use]
pub fn status_field_bytes(status: &str, field: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let value = line.strip_prefix(field)?.strip_prefix(':')?;
        let kib: u64 = value.split_whitespace().next()?.parse().ok()?;
        Some(kib * 1024)
    })
}

/// First field of `schedstat`: nanoseconds spent on a CPU.
#[must_use]
pub fn parse_schedstat(content: &str) -> Option<u64> {
    content.split_whitespace().next()?.parse().ok()
}

/// Parse a CPU list such as "0-3" or "0-3,8-11" from
/// `/sys/devices/system/cpu/online`.
pub fn parse_cpu_list(content: &str) -> Result<Vec<u32>> {
    let mut cpus = Vec::new();

    for range in content.trim().split(',').filter(|r| !r.is_empty()) {
        if let Some((start, end)) = range.split_once('-') {
            let start: u32 = start.parse()?;
            let end: u32 = end.parse()?;
            cpus.extend(start..=end);
        } else {
            cpus.push(range.parse()?);
        }
    }

    Ok(cpus)
}

/// `<root>/<pid>`
#[must_use]
pub fn pid_dir(root: &Path, pid: Pid) -> PathBuf {
    root.join(pid.0.to_string())
}

/// `<root>/<pid>/task/<tid>`
#[must_use]
pub fn task_dir(root: &Path, pid: Pid, tid: Tid) -> PathBuf {
    pid_dir(root, pid).join("task").join(tid.0.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (my-app) S 1 1234 1234 0 -1 4194560 120 0 0 0 \
                        250 75 0 0 20 0 4 0 9876 123456789 300 18446744073709551615";

    #[test]
    fn test_extract_comm() {
        assert_eq!(extract_comm(STAT).unwrap(), "my-app");
    }

    #[test]
    fn test_extract_comm_with_parens() {
        // Command names can contain parentheses
        let stat = "1234 (app (v2)) S 1 1234";
        assert_eq!(extract_comm(stat).unwrap(), "app (v2)");
    }

    #[test]
    fn test_parse_stat_fields() {
        let stat = parse_stat(STAT).unwrap();
        assert_eq!(stat.comm, "my-app");
        assert_eq!(stat.parent_pid, 1);
        assert_eq!(stat.flags, 4_194_560);
        assert_eq!(stat.utime, 250);
        assert_eq!(stat.stime, 75);
        assert_eq!(stat.priority, 20);
    }

    #[test]
    fn test_parse_stat_truncated() {
        assert!(parse_stat("1 (init) S 0").is_err());
    }

    #[test]
    fn test_status_field_bytes() {
        let status = "Name:\tmy-app\nVmSize:\t  204800 kB\nVmRSS:\t    1024 kB\n";
        assert_eq!(status_field_bytes(status, "VmRSS"), Some(1024 * 1024));
        assert_eq!(status_field_bytes(status, "VmSize"), Some(204_800 * 1024));
        assert_eq!(status_field_bytes(status, "VmSwap"), None);
    }

    #[test]
    fn test_parse_schedstat() {
        assert_eq!(parse_schedstat("123456 789 10\n"), Some(123_456));
        assert_eq!(parse_schedstat(""), None);
    }

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3\n").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpu_list("0-1,8-9").unwrap(), vec![0, 1, 8, 9]);
        assert_eq!(parse_cpu_list("5").unwrap(), vec![5]);
        assert!(parse_cpu_list("x").is_err());
    }
}
