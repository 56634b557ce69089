//! Process enumeration from `/proc`

use log::trace;
use std::fs::{self, ReadDir};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use livetrace_common::{ProcessInfo, ThreadInfo};

use super::procfs::{parse_stat, pid_dir};
use crate::domain::{EnumerationError, Pid};
use crate::platform::ProcessSource;

/// Lists processes and their threads from a proc tree
#[derive(Debug, Clone)]
pub struct ProcfsProcessSource {
    proc_root: PathBuf,
}

impl ProcfsProcessSource {
    #[must_use]
    pub fn new(proc_root: &Path) -> Self {
        Self { proc_root: proc_root.to_path_buf() }
    }

    /// One process, `None` when it vanished while being read
    fn read_process(&self, pid: u32) -> Option<ProcessInfo> {
        let dir = pid_dir(&self.proc_root, Pid(pid));
        let stat = parse_stat(&fs::read_to_string(dir.join("stat")).ok()?).ok()?;

        // Kernel threads and foreign processes have no readable exe link
        let image_name = fs::read_link(dir.join("exe"))
            .ok()
            .and_then(|exe| exe.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| stat.comm.clone());

        let threads = match fs::read_dir(dir.join("task")) {
            Ok(entries) => read_threads(&dir, pid, entries),
            Err(e) => {
                trace!("{pid}: no task list ({e})");
                Vec::new()
            }
        };

        Some(ProcessInfo {
            id: pid,
            parent_id: stat.parent_pid,
            image_name,
            base_priority: stat.priority,
            flags: stat.flags,
            threads,
        })
    }
}

fn read_threads(dir: &Path, pid: u32, entries: ReadDir) -> Vec<ThreadInfo> {
    let mut threads: Vec<ThreadInfo> = entries
        .filter_map(|entry| {
            let tid: u32 = entry.ok()?.file_name().to_str()?.parse().ok()?;
            let stat_path = dir.join("task").join(tid.to_string()).join("stat");
            let stat = parse_stat(&fs::read_to_string(stat_path).ok()?).ok()?;
            Some(ThreadInfo {
                id: tid,
                owner_process_id: pid,
                base_priority: stat.priority,
                flags: stat.flags,
            })
        })
        .collect();
    threads.sort_by_key(|t| t.id);
    threads
}

impl ProcessSource for ProcfsProcessSource {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, EnumerationError> {
        let entries = fs::read_dir(&self.proc_root)?;

        let mut processes = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.kind() == ErrorKind::Interrupted => return Err(e.into()),
                Err(_) => continue,
            };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if let Some(process) = self.read_process(pid) {
                processes.push(process);
            }
        }

        processes.sort_by_key(|p| p.id);
        Ok(processes)
    }
}
