//! Pre-flight checks run before attaching to a target
//!
//! Turns the usual reasons an attach fails (wrong PID, missing privileges,
//! Yama restrictions) into clear, actionable [`AttachError`]s.

use log::warn;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::procfs::pid_dir;
use crate::domain::{AttachError, Pid};

/// Run all pre-flight checks for attaching to `pid`
///
/// # Errors
/// Returns the first check that fails
pub fn run_preflight_checks(proc_root: &Path, pid: Pid) -> Result<(), AttachError> {
    check_process_exists(proc_root, pid)?;
    check_proc_access(proc_root, pid)?;
    if let Some(warning) = ptrace_scope_warning(proc_root) {
        warn!("{warning}");
    }
    Ok(())
}

/// Check if the target process exists
///
/// # Errors
/// [`AttachError::ProcessNotFound`] when `/proc/<pid>` is missing
pub fn check_process_exists(proc_root: &Path, pid: Pid) -> Result<(), AttachError> {
    if !pid.is_traceable() || !pid_dir(proc_root, pid).exists() {
        return Err(AttachError::ProcessNotFound(pid));
    }
    Ok(())
}

/// Check if we can read the process's memory maps
///
/// # Errors
/// [`AttachError::PermissionDenied`] when the maps are unreadable
pub fn check_proc_access(proc_root: &Path, pid: Pid) -> Result<(), AttachError> {
    let maps_path = pid_dir(proc_root, pid).join("maps");
    match fs::read_to_string(&maps_path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AttachError::ProcessNotFound(pid)),
        Err(e) => Err(AttachError::PermissionDenied {
            pid,
            reason: format!(
                "cannot read {} ({e}); run as the target's owner or with sudo",
                maps_path.display()
            ),
        }),
    }
}

/// Warn when Yama restricts reading other processes' stacks
///
/// `ptrace_scope` 1 limits access to descendants, 2 to `CAP_SYS_PTRACE`,
/// 3 disables it entirely. Attaching still succeeds; stack reads will
/// degrade to top frames only.
#[must_use]
pub fn ptrace_scope_warning(proc_root: &Path) -> Option<String> {
    let scope_path = proc_root.join("sys/kernel/yama/ptrace_scope");
    let scope: u32 = fs::read_to_string(scope_path).ok()?.trim().parse().ok()?;
    match scope {
        0 => None,
        1 => Some(
            "kernel.yama.ptrace_scope = 1: stacks of non-descendant processes \
             need CAP_SYS_PTRACE (run with sudo)"
                .to_string(),
        ),
        n => Some(format!(
            "kernel.yama.ptrace_scope = {n}: stack memory of other processes \
             is not readable, only top frames will be sampled"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_not_found() {
        let result = check_process_exists(Path::new("/proc"), Pid(999_999_999));
        assert!(matches!(result, Err(AttachError::ProcessNotFound(Pid(999_999_999)))));
    }

    #[test]
    fn test_pid_zero_is_never_found() {
        assert!(check_process_exists(Path::new("/proc"), Pid(0)).is_err());
    }

    #[test]
    fn test_own_process_passes() {
        let pid = Pid(std::process::id());
        assert!(run_preflight_checks(Path::new("/proc"), pid).is_ok());
    }

    #[test]
    fn test_ptrace_scope_warning_levels() {
        let root = tempfile::tempdir().unwrap();
        let yama = root.path().join("sys/kernel/yama");
        fs::create_dir_all(&yama).unwrap();

        fs::write(yama.join("ptrace_scope"), "0\n").unwrap();
        assert!(ptrace_scope_warning(root.path()).is_none());

        fs::write(yama.join("ptrace_scope"), "3\n").unwrap();
        assert!(ptrace_scope_warning(root.path()).unwrap().contains("only top frames"));
    }

    #[test]
    fn test_ptrace_scope_missing_file() {
        let root = tempfile::tempdir().unwrap();
        assert!(ptrace_scope_warning(root.path()).is_none());
    }
}
