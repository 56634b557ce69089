//! # Platform Capability Interface
//!
//! The only non-portable layer of livetrace. Everything above this module
//! (sampler, aggregation, snapshots, UI) talks to the host exclusively
//! through these traits:
//!
//! - [`TraceBackend`] / [`TraceSession`]: non-invasive attach, thread
//!   listing, stack walking and symbol lookup for one target
//! - [`ProcessSource`]: point-in-time enumeration of system processes
//! - [`ResourceMonitor`]: CPU and memory usage polling for a PID
//!
//! [`native_backend`], [`native_process_source`] and [`native_monitor`]
//! return the concrete binding for the host.

use std::path::Path;
use std::sync::Arc;

use livetrace_common::{ProcessInfo, StackFrame, Symbol};

use crate::domain::{AttachError, BindingError, EnumerationError, Pid, Tid};

#[cfg(target_os = "linux")]
pub mod linux;

/// Opens trace sessions against live processes.
///
/// Shared between the controller and every sampling worker it spawns.
pub trait TraceBackend: Send + Sync {
    /// Open `pid` for tracing without suspending it.
    ///
    /// # Errors
    /// Returns an [`AttachError`] when the process does not exist or cannot
    /// be opened with the required access.
    fn attach(&self, pid: Pid) -> Result<Box<dyn TraceSession>, AttachError>;
}

/// An attached target, exclusively owned by one sampling worker.
///
/// Sessions are created and dropped on the worker's own thread, so they need
/// not be `Send`.
pub trait TraceSession {
    /// Full image name of the target
    fn process_name(&self) -> String;

    /// Block until the attach handshake has completed.
    ///
    /// There is no timeout: a binding whose attach never
    /// completes keeps the session in `preparing` until `stop()`, and even
    /// `stop()` cannot interrupt this wait.
    ///
    /// # Errors
    /// Returns an [`AttachError`] if the handshake fails.
    fn wait_attached(&mut self) -> Result<(), AttachError>;

    /// Ids of all threads of the target, in enumeration order
    ///
    /// # Errors
    /// A [`BindingError`]; fatal ones end the session.
    fn thread_ids(&mut self) -> Result<Vec<Tid>, BindingError>;

    /// CPU consumed by `tid` so far (best-effort)
    ///
    /// # Errors
    /// A [`BindingError`]; callers substitute 0.
    fn cycles(&mut self, tid: Tid) -> Result<u64, BindingError>;

    /// Up to `max_frames` frames of `tid`, innermost first, symbols unresolved
    ///
    /// # Errors
    /// A [`BindingError`]; the thread is skipped for this iteration.
    fn stack_trace(&mut self, tid: Tid, max_frames: usize) -> Result<Vec<StackFrame>, BindingError>;

    /// Resolve an instruction address, `None` when no symbol covers it
    fn resolve(&mut self, address: u64) -> Option<Symbol>;

    /// Release the target. Called exactly once, when sampling ends.
    fn detach(&mut self);
}

/// Enumerates all processes and their threads in one pass.
pub trait ProcessSource: Send + Sync {
    /// # Errors
    /// [`EnumerationError::Transient`] asks the caller to retry.
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, EnumerationError>;
}

/// CPU and memory usage of a process.
///
/// Every query is best-effort and returns 0 for unknown processes.
pub trait ResourceMonitor: Send + Sync {
    /// Share of total CPU capacity used since the previous call for `pid`
    /// (0.0 - 1.0).
    fn cpu_usage(&self, pid: Pid) -> f64;

    /// Resident memory in bytes
    fn phys_mem_usage(&self, pid: Pid) -> u64;

    /// Virtual memory in bytes
    fn virt_mem_usage(&self, pid: Pid) -> u64;
}

/// A backend for hosts without a binding; every attach fails.
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl TraceBackend for UnsupportedBackend {
    fn attach(&self, _pid: Pid) -> Result<Box<dyn TraceSession>, AttachError> {
        Err(AttachError::Unsupported(std::env::consts::OS.to_string()))
    }
}

impl ProcessSource for UnsupportedBackend {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, EnumerationError> {
        Err(EnumerationError::Unavailable(format!(
            "no process enumeration on {}",
            std::env::consts::OS
        )))
    }
}

impl ResourceMonitor for UnsupportedBackend {
    fn cpu_usage(&self, _pid: Pid) -> f64 {
        0.0
    }

    fn phys_mem_usage(&self, _pid: Pid) -> u64 {
        0
    }

    fn virt_mem_usage(&self, _pid: Pid) -> u64 {
        0
    }
}

/// The trace backend for this host, reading process state under `proc_root`
#[cfg(target_os = "linux")]
#[must_use]
pub fn native_backend(proc_root: &Path) -> Arc<dyn TraceBackend> {
    Arc::new(linux::ProcfsBackend::new(proc_root))
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn native_backend(_proc_root: &Path) -> Arc<dyn TraceBackend> {
    Arc::new(UnsupportedBackend)
}

/// The process enumerator for this host
#[cfg(target_os = "linux")]
#[must_use]
pub fn native_process_source(proc_root: &Path) -> Arc<dyn ProcessSource> {
    Arc::new(linux::ProcfsProcessSource::new(proc_root))
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn native_process_source(_proc_root: &Path) -> Arc<dyn ProcessSource> {
    Arc::new(UnsupportedBackend)
}

/// The resource monitor for this host
#[cfg(target_os = "linux")]
#[must_use]
pub fn native_monitor(proc_root: &Path) -> Arc<dyn ResourceMonitor> {
    Arc::new(linux::ProcfsMonitor::new(proc_root))
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn native_monitor(_proc_root: &Path) -> Arc<dyn ResourceMonitor> {
    Arc::new(UnsupportedBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_refuses_attach() {
        let result = UnsupportedBackend.attach(Pid(1));
        assert!(matches!(result, Err(AttachError::Unsupported(_))));
    }

    #[test]
    fn test_unsupported_backend_reports_nothing() {
        assert!(UnsupportedBackend.enumerate().is_err());
        assert_eq!(UnsupportedBackend.phys_mem_usage(Pid(1)), 0);
    }
}
