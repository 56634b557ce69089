//! Structured error types for livetrace
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only [`AttachError`] and fatal [`BindingError`]s change the observable
//! session state; everything else degrades to missing data in a snapshot.

use super::types::{Pid, Tid};
use thiserror::Error;

/// The target cannot be opened or attached without suspending it.
#[derive(Error, Debug)]
pub enum AttachError {
    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Permission denied attaching to {pid}: {reason}")]
    PermissionDenied { pid: Pid, reason: String },

    #[error("Attach is not supported on this platform: {0}")]
    Unsupported(String),

    #[error("Failed to attach to {pid}: {reason}")]
    Failed { pid: Pid, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single debug/trace binding call failed mid-loop.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Thread {0} is no longer available")]
    ThreadUnavailable(Tid),

    #[error("Stack of {tid} is not readable: {reason}")]
    StackUnavailable { tid: Tid, reason: String },

    #[error("Target process {0} exited")]
    TargetExited(Pid),

    #[error("Lost access to target process {pid}: {reason}")]
    SessionLost { pid: Pid, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BindingError {
    /// Fatal errors end the sampling loop; all others just drop data for
    /// the current iteration.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TargetExited(_) | Self::SessionLost { .. })
    }
}

/// Enumerating system processes failed.
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("Process enumeration interrupted: {0}")]
    Transient(String),

    #[error("Process enumeration unavailable: {0}")]
    Unavailable(String),
}

impl EnumerationError {
    /// Transient failures are retried by the process directory.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<std::io::Error> for EnumerationError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock => {
                Self::Transient(err.to_string())
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

/// A control message could not be understood.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Control channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_error_display() {
        let err = AttachError::ProcessNotFound(Pid(1234));
        assert_eq!(err.to_string(), "Process PID:1234 not found");
    }

    #[test]
    fn test_permission_denied_mentions_reason() {
        let err = AttachError::PermissionDenied {
            pid: Pid(42),
            reason: "ptrace_scope is 3".to_string(),
        };
        assert!(err.to_string().contains("PID:42"));
        assert!(err.to_string().contains("ptrace_scope"));
    }

    #[test]
    fn test_binding_error_fatality() {
        assert!(BindingError::TargetExited(Pid(1)).is_fatal());
        assert!(!BindingError::ThreadUnavailable(Tid(2)).is_fatal());
        assert!(!BindingError::StackUnavailable { tid: Tid(2), reason: "running".into() }.is_fatal());
    }

    #[test]
    fn test_enumeration_error_from_io() {
        let transient: EnumerationError =
            std::io::Error::from(std::io::ErrorKind::Interrupted).into();
        assert!(transient.is_transient());

        let fatal: EnumerationError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(!fatal.is_transient());
    }
}
