//! Non-invasive trace sessions built on procfs
//!
//! Nothing here stops or signals the target:
//!
//! - `/proc/<pid>/task/<tid>/syscall` reports the user stack pointer and
//!   program counter of a thread that is currently inside the kernel
//!   (sleeping, waiting on I/O, in a syscall). A thread that is running on a
//!   CPU reports `running` and yields no stack for that iteration.
//! - Frames below the top one come from scanning the thread's stack with
//!   `process_vm_readv`, keeping words that point into executable mappings.
//!   This is the classic return-address heuristic: cheap and safe, but it
//!   may report stale return addresses left on the stack.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use livetrace_common::{StackFrame, Symbol};

use super::memory_maps::MemoryMap;
use super::preflight::run_preflight_checks;
use super::procfs::{extract_comm, parse_schedstat, pid_dir, task_dir};
use super::symbolizer::Symbolizer;
use crate::domain::{AttachError, BindingError, Pid, Tid};
use crate::platform::{TraceBackend, TraceSession};

/// Bytes of stack scanned upwards from the stack pointer of the focus thread
const STACK_SCAN_BYTES: usize = 64 * 1024;

/// Minimum time between two re-reads of the memory map on a miss
const MAPS_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Opens [`ProcfsSession`]s for processes under a proc root
#[derive(Debug, Clone)]
pub struct ProcfsBackend {
    proc_root: PathBuf,
}

impl ProcfsBackend {
    #[must_use]
    pub fn new(proc_root: &Path) -> Self {
        Self { proc_root: proc_root.to_path_buf() }
    }
}

impl TraceBackend for ProcfsBackend {
    fn attach(&self, pid: Pid) -> Result<Box<dyn TraceSession>, AttachError> {
        run_preflight_checks(&self.proc_root, pid)?;

        let process_name = read_process_name(&self.proc_root, pid)?;
        let maps = MemoryMap::read(&self.proc_root, pid).map_err(|e| AttachError::Failed {
            pid,
            reason: format!("{e:#}"),
        })?;

        info!("Attached to {pid} ({process_name})");
        Ok(Box::new(ProcfsSession {
            pid,
            proc_root: self.proc_root.clone(),
            process_name,
            maps,
            maps_read_at: Instant::now(),
            symbolizers: HashMap::new(),
            memory_readable: true,
        }))
    }
}

/// Image path from `/proc/<pid>/exe`, falling back to `comm` for kernel
/// threads and processes whose exe link is not readable.
fn read_process_name(proc_root: &Path, pid: Pid) -> Result<String, AttachError> {
    let dir = pid_dir(proc_root, pid);
    if let Ok(exe) = fs::read_link(dir.join("exe")) {
        return Ok(exe.to_string_lossy().into_owned());
    }
    match fs::read_to_string(dir.join("stat")) {
        Ok(stat) => extract_comm(&stat)
            .map_err(|e| AttachError::Failed { pid, reason: e.to_string() }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AttachError::ProcessNotFound(pid)),
        Err(e) => Err(e.into()),
    }
}

/// A procfs-backed [`TraceSession`]
pub struct ProcfsSession {
    pid: Pid,
    proc_root: PathBuf,
    process_name: String,
    maps: MemoryMap,
    maps_read_at: Instant,
    /// One symbolizer per binary path; `None` when the binary is unreadable
    symbolizers: HashMap<String, Option<Symbolizer>>,
    /// Cleared once `process_vm_readv` is denied
    memory_readable: bool,
}

impl ProcfsSession {
    fn exited_or(&self, err: std::io::Error, tid: Tid) -> BindingError {
        if !pid_dir(&self.proc_root, self.pid).exists() {
            BindingError::TargetExited(self.pid)
        } else if err.kind() == ErrorKind::NotFound {
            BindingError::ThreadUnavailable(tid)
        } else {
            BindingError::StackUnavailable { tid, reason: err.to_string() }
        }
    }

    /// Re-read the memory map when an address falls outside every known
    /// mapping (libraries loaded after attach), at most once per interval.
    fn refresh_maps(&mut self) {
        if self.maps_read_at.elapsed() < MAPS_REFRESH_INTERVAL {
            return;
        }
        self.maps_read_at = Instant::now();
        match MemoryMap::read(&self.proc_root, self.pid) {
            Ok(maps) => self.maps = maps,
            Err(e) => debug!("Keeping stale memory map: {e:#}"),
        }
    }

    /// Return addresses found on the stack above `sp`
    fn scan_stack(&mut self, sp: u64, limit: usize) -> Vec<(u64, u64)> {
        if !self.memory_readable || limit == 0 {
            return Vec::new();
        }

        let mut buffer = vec![0u8; STACK_SCAN_BYTES];
        let read = match read_process_memory(self.pid, sp, &mut buffer) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!("Cannot read stack memory of {} ({e}), sampling top frames only", self.pid);
                self.memory_readable = false;
                return Vec::new();
            }
            Err(e) => {
                debug!("Stack scan at 0x{sp:x} failed: {e}");
                return Vec::new();
            }
        };

        buffer[..read]
            .chunks_exact(8)
            .enumerate()
            .filter_map(|(slot, word)| {
                let value = u64::from_ne_bytes(word.try_into().ok()?);
                self.maps.is_executable(value).then_some((sp + slot as u64 * 8, value))
            })
            .take(limit)
            .collect()
    }
}

impl TraceSession for ProcfsSession {
    fn process_name(&self) -> String {
        self.process_name.clone()
    }

    fn wait_attached(&mut self) -> Result<(), AttachError> {
        // procfs has no attach handshake; attach() already did all the work.
        Ok(())
    }

    fn thread_ids(&mut self) -> Result<Vec<Tid>, BindingError> {
        let task_root = pid_dir(&self.proc_root, self.pid).join("task");
        let entries = fs::read_dir(&task_root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BindingError::TargetExited(self.pid),
            _ => BindingError::SessionLost { pid: self.pid, reason: e.to_string() },
        })?;

        let mut tids: Vec<Tid> = entries
            .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok().map(Tid))
            .collect();
        tids.sort_unstable();
        Ok(tids)
    }

    fn cycles(&mut self, tid: Tid) -> Result<u64, BindingError> {
        let path = task_dir(&self.proc_root, self.pid, tid).join("schedstat");
        let content = fs::read_to_string(path).map_err(|e| self.exited_or(e, tid))?;
        parse_schedstat(&content).ok_or_else(|| BindingError::StackUnavailable {
            tid,
            reason: "malformed schedstat".to_string(),
        })
    }

    fn stack_trace(&mut self, tid: Tid, max_frames: usize) -> Result<Vec<StackFrame>, BindingError> {
        if max_frames == 0 {
            return Ok(Vec::new());
        }

        let path = task_dir(&self.proc_root, self.pid, tid).join("syscall");
        let content = fs::read_to_string(path).map_err(|e| self.exited_or(e, tid))?;
        let (sp, pc) = parse_syscall_registers(&content).ok_or_else(|| {
            BindingError::StackUnavailable { tid, reason: content.trim().to_string() }
        })?;

        let mut frames = vec![StackFrame { instruction_offset: pc, stack_offset: sp, ..StackFrame::default() }];
        for (slot, address) in self.scan_stack(sp, max_frames - 1) {
            frames.push(StackFrame {
                instruction_offset: address,
                stack_offset: slot,
                frame_offset: slot,
                ..StackFrame::default()
            });
        }

        // Each frame returns into the one below it
        let callers: Vec<u64> = frames.iter().skip(1).map(|f| f.instruction_offset).collect();
        for (number, frame) in frames.iter_mut().enumerate() {
            frame.frame_number = u32::try_from(number).unwrap_or(u32::MAX);
            frame.return_offset = callers.get(number).copied().unwrap_or(0);
        }
        Ok(frames)
    }

    fn resolve(&mut self, address: u64) -> Option<Symbol> {
        if self.maps.executable_mapping(address).is_none() {
            self.refresh_maps();
        }
        let path = self.maps.executable_mapping(address)?.path.clone()?;
        let load_base = self.maps.load_base(&path)?;

        let symbolizer = self
            .symbolizers
            .entry(path)
            .or_insert_with_key(|path| match Symbolizer::new(path) {
                Ok(symbolizer) => Some(symbolizer),
                Err(e) => {
                    debug!("No symbols for {path}: {e:#}");
                    None
                }
            })
            .as_ref()?;

        // runtime = image + bias
        let bias = load_base.wrapping_sub(symbolizer.image_base());
        let mut symbol = symbolizer.resolve(address.wrapping_sub(bias))?;
        symbol.function_start_address = symbol.function_start_address.wrapping_add(bias);
        Some(symbol)
    }

    fn detach(&mut self) {
        info!(
            "Detached from {} ({} binaries symbolized)",
            self.pid,
            self.symbolizers.values().filter(|s| s.is_some()).count()
        );
        self.symbolizers.clear();
    }
}

/// Parse `/proc/<pid>/task/<tid>/syscall`.
///
/// Formats: `running`, `-1 <sp> <pc>` (blocked outside a syscall) and
/// `<nr> <arg1> ... <arg6> <sp> <pc>`. Returns `(sp, pc)`.
fn parse_syscall_registers(content: &str) -> Option<(u64, u64)> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    let parse_hex = |s: &str| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok();
    let sp = parse_hex(fields[fields.len() - 2])?;
    let pc = parse_hex(fields[fields.len() - 1])?;
    (pc != 0).then_some((sp, pc))
}

/// Copy target memory at `address` into `buffer` without stopping the target.
///
/// Returns the number of bytes read, which may be short at the end of the
/// stack mapping.
#[allow(unsafe_code)]
fn read_process_memory(pid: Pid, address: u64, buffer: &mut [u8]) -> std::io::Result<usize> {
    let local = libc::iovec { iov_base: buffer.as_mut_ptr().cast(), iov_len: buffer.len() };
    let remote = libc::iovec { iov_base: address as *mut libc::c_void, iov_len: buffer.len() };

    let pid = libc::pid_t::try_from(pid.0)
        .map_err(|_| std::io::Error::from(ErrorKind::InvalidInput))?;
    // SAFETY: `local` describes `buffer`, which is valid for writes of its full
    // length; the remote iovec is only interpreted by the kernel.
    let read = unsafe { libc::process_vm_readv(pid, &local, 1, &remote, 1, 0) };
    usize::try_from(read).map_err(|_| std::io::Error::last_os_error())
}
