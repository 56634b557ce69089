//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent passing a thread id where a process id is
//! expected, and make the control surface signatures self-describing.

use std::fmt;

/// Process ID
///
/// `Pid(0)` never names a traceable process; the control surface treats it
/// as "stop tracing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pid(pub u32);

impl Pid {
    /// Returns true for a PID that can be traced (non-zero)
    #[must_use]
    pub fn is_traceable(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Pid(pid)
    }
}

/// Thread ID
///
/// The OS-assigned id of a thread inside the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

impl From<u32> for Tid {
    fn from(tid: u32) -> Self {
        Tid(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid(1234).to_string(), "PID:1234");
        assert_eq!(Tid(7).to_string(), "TID:7");
    }

    #[test]
    fn test_pid_traceable() {
        assert!(Pid(1).is_traceable());
        assert!(!Pid(0).is_traceable());
        assert!(!Pid::default().is_traceable());
    }
}
