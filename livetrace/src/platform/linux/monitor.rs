//! CPU and memory usage of a target from procfs
//!
//! CPU usage is the utime+stime delta between two queries for the same PID,
//! divided by the wall-clock delta times the number of online CPUs. The
//! first query for a PID only primes the baseline and reports 0.

use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use super::procfs::{parse_cpu_list, parse_stat, pid_dir, status_field_bytes};
use crate::domain::Pid;
use crate::platform::ResourceMonitor;

const CPU_ONLINE_PATH: &str = "/sys/devices/system/cpu/online";

/// Resource usage queries under a proc root
#[derive(Debug)]
pub struct ProcfsMonitor {
    proc_root: PathBuf,
    online_cpus: usize,
    clock_ticks: f64,
    /// Last CPU time observed per PID: (when, utime + stime in ticks)
    baselines: Mutex<HashMap<Pid, (Instant, u64)>>,
}

impl ProcfsMonitor {
    #[must_use]
    pub fn new(proc_root: &Path) -> Self {
        Self::with_cpus(proc_root, online_cpu_count())
    }

    /// A monitor that assumes `online_cpus` CPUs
    #[must_use]
    pub fn with_cpus(proc_root: &Path, online_cpus: usize) -> Self {
        Self {
            proc_root: proc_root.to_path_buf(),
            online_cpus: online_cpus.max(1),
            clock_ticks: clock_ticks_per_second(),
            baselines: Mutex::new(HashMap::new()),
        }
    }

    fn cpu_ticks(&self, pid: Pid) -> Option<u64> {
        let content = fs::read_to_string(pid_dir(&self.proc_root, pid).join("stat")).ok()?;
        let stat = parse_stat(&content).ok()?;
        Some(stat.utime + stat.stime)
    }

    fn status_bytes(&self, pid: Pid, field: &str) -> u64 {
        fs::read_to_string(pid_dir(&self.proc_root, pid).join("status"))
            .ok()
            .and_then(|status| status_field_bytes(&status, field))
            .unwrap_or(0)
    }
}

#[allow(clippy::cast_precision_loss)]
impl ResourceMonitor for ProcfsMonitor {
    fn cpu_usage(&self, pid: Pid) -> f64 {
        let now = Instant::now();
        let mut baselines = self.baselines.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(ticks) = self.cpu_ticks(pid) else {
            baselines.remove(&pid);
            return 0.0;
        };
        let Some((then, previous)) = baselines.insert(pid, (now, ticks)) else {
            return 0.0;
        };

        let wall = now.duration_since(then).as_secs_f64();
        if wall <= 0.0 {
            return 0.0;
        }
        let used = ticks.saturating_sub(previous) as f64 / self.clock_ticks;
        (used / (wall * self.online_cpus as f64)).clamp(0.0, 1.0)
    }

    fn phys_mem_usage(&self, pid: Pid) -> u64 {
        self.status_bytes(pid, "VmRSS")
    }

    fn virt_mem_usage(&self, pid: Pid) -> u64 {
        self.status_bytes(pid, "VmSize")
    }
}

/// Number of online CPUs, falling back to the available parallelism
fn online_cpu_count() -> usize {
    match fs::read_to_string(CPU_ONLINE_PATH).map(|c| parse_cpu_list(&c)) {
        Ok(Ok(cpus)) if !cpus.is_empty() => cpus.len(),
        other => {
            debug!("Cannot read {CPU_ONLINE_PATH} ({other:?}), using available parallelism");
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        }
    }
}

#[allow(unsafe_code, clippy::cast_precision_loss)]
fn clock_ticks_per_second() -> f64 {
    // SAFETY: sysconf has no preconditions
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        100.0
    }
}
