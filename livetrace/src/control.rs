//! # Control Surface
//!
//! JSON commands, one object per message, dispatched by `"type"`:
//!
//! | type       | fields           | effect                                       |
//! |------------|------------------|----------------------------------------------|
//! | `process`  | `rule: string`   | start tracing the matching process, or stop  |
//! | `pause`    |                  | toggle pause/resume                          |
//! | `thread`   | `thread: int`    | change the focus thread                      |
//! | `snapshot` |                  | reply `{"type":"snapshot","data":{...}}`     |
//!
//! [`Controller`] is the one context object that owns the tracer; transports
//! (headless stdin/stdout, the TUI) hold it and feed it commands.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::domain::{ControlError, Pid, Tid};
use crate::platform::ProcessSource;
use crate::process_directory::ProcessDirectory;
use crate::profiling::{Snapshot, Tracer};

/// A control command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    Process {
        #[serde(default)]
        rule: String,
    },
    Pause,
    Thread {
        #[serde(default)]
        thread: u32,
    },
    Snapshot,
}

/// A reply to a command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    Snapshot { data: Snapshot },
}

/// Owns the tracer and the process source for the lifetime of the program
pub struct Controller {
    tracer: Tracer,
    processes: Arc<dyn ProcessSource>,
}

impl Controller {
    #[must_use]
    pub fn new(tracer: Tracer, processes: Arc<dyn ProcessSource>) -> Self {
        Self { tracer, processes }
    }

    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Apply a command; only `snapshot` produces a reply
    pub fn dispatch(&mut self, command: Command) -> Option<Reply> {
        match command {
            Command::Process { rule } => {
                self.retarget(&rule);
                None
            }
            Command::Pause => {
                let state = self.tracer.pause();
                debug!("Pause toggled, now {}", state.label());
                None
            }
            Command::Thread { thread } => {
                self.tracer.select(Tid(thread));
                None
            }
            Command::Snapshot => Some(Reply::Snapshot { data: self.tracer.snapshot() }),
        }
    }

    /// Parse one JSON message, apply it and serialize the reply
    ///
    /// # Errors
    /// [`ControlError::Malformed`] when the message is not a valid command.
    pub fn handle_message(&mut self, message: &str) -> Result<Option<String>, ControlError> {
        let command: Command = serde_json::from_str(message)?;
        self.dispatch(command).map(|reply| serde_json::to_string(&reply)).transpose().map_err(Into::into)
    }

    /// Start tracing the process `rule` names, or stop when it names none.
    ///
    /// Returns the PID now being traced.
    pub fn retarget(&mut self, rule: &str) -> Option<Pid> {
        let pid = match ProcessDirectory::snapshot(self.processes.as_ref()) {
            Ok(directory) => directory.find_by_rule(rule).map(|p| Pid(p.id)),
            Err(e) => {
                warn!("Cannot list processes: {e}");
                None
            }
        };

        match pid {
            Some(pid) if pid.is_traceable() => {
                info!("Rule '{rule}' matched {pid}");
                self.tracer.start(pid);
                Some(pid)
            }
            _ => {
                if self.tracer.state().is_active() {
                    info!("Rule '{rule}' matched no process, stopping {}", self.tracer.pid());
                }
                self.tracer.stop();
                None
            }
        }
    }

    /// [`Self::handle_message`] run where blocking is allowed.
    ///
    /// Stopping a session joins its sampler thread and retargeting lists
    /// every process, so on a multi-threaded runtime the current worker is
    /// handed over to other tasks first.
    ///
    /// # Errors
    /// [`ControlError::Malformed`] when the message is not a valid command.
    pub fn handle_message_blocking(&mut self, message: &str) -> Result<Option<String>, ControlError> {
        block_in_place(|| self.handle_message(message))
    }

    /// [`Self::dispatch`] run where blocking is allowed
    pub fn dispatch_blocking(&mut self, command: Command) -> Option<Reply> {
        block_in_place(|| self.dispatch(command))
    }

    /// Stop tracing; used on shutdown
    pub fn shutdown(&mut self) {
        self.tracer.stop();
    }
}

/// Run `f` off the async scheduler when called from a multi-threaded runtime
fn block_in_place<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
