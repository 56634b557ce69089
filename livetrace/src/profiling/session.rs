//! # Session State Machine
//!
//! ```text
//!  start(pid)          attached            pause()
//! ───────────▶ preparing ───────▶ running ◀────────▶ paused
//!                  │                 │                  │
//!                  │ attach error    │ fatal binding    │
//!                  ▼                 ▼ error            │
//!                failed ◀────────────┘                  │
//!                  │                                    │
//!                  └────────────── stop() ──────────────┴──▶ exited
//! ```
//!
//! [`Tracer`] is the controller-side handle. `start` and `stop` are
//! synchronous: `stop` joins the worker, and `start` stops any previous
//! session before clearing the store, so samples of two targets never
//! interleave. `pause` and `select` only flip atomics the worker observes.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use livetrace_common::SessionState;

use super::aggregation::AggregationStore;
use super::sampler::{run_worker, SamplerConfig};
use super::snapshot::Snapshot;
use crate::domain::{Pid, Tid};
use crate::platform::{ResourceMonitor, TraceBackend};

/// Flags shared between the controller and the sampling worker
#[derive(Debug)]
pub struct SessionControl {
    state: AtomicU8,
    exit: AtomicBool,
    focus: AtomicU32,
    pid: AtomicU32,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Exited.as_u8()),
            exit: AtomicBool::new(false),
            focus: AtomicU32::new(0),
            pid: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// `preparing → running`; leaves any other state alone
    pub fn mark_running(&self) {
        let _ = self.state.compare_exchange(
            SessionState::Preparing.as_u8(),
            SessionState::Running.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// `running ⇄ paused`; a no-op in every other state
    pub fn toggle_pause(&self) -> SessionState {
        let result = self.state.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
            match SessionState::from_u8(raw) {
                SessionState::Running => Some(SessionState::Paused.as_u8()),
                SessionState::Paused => Some(SessionState::Running.as_u8()),
                _ => None,
            }
        });
        let previous = SessionState::from_u8(result.unwrap_or_else(|raw| raw));
        match previous {
            SessionState::Running => SessionState::Paused,
            SessionState::Paused => SessionState::Running,
            other => other,
        }
    }

    #[must_use]
    pub fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    fn request_exit(&self, exit: bool) {
        self.exit.store(exit, Ordering::SeqCst);
    }

    #[must_use]
    pub fn focus(&self) -> u32 {
        self.focus.load(Ordering::SeqCst)
    }

    pub fn set_focus(&self, tid: Tid) {
        self.focus.store(tid.0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        Pid(self.pid.load(Ordering::SeqCst))
    }

    fn set_pid(&self, pid: Pid) {
        self.pid.store(pid.0, Ordering::SeqCst);
    }
}

/// Controls the single live tracing session
pub struct Tracer {
    backend: Arc<dyn TraceBackend>,
    monitor: Arc<dyn ResourceMonitor>,
    config: SamplerConfig,
    control: Arc<SessionControl>,
    store: AggregationStore,
    worker: Option<JoinHandle<()>>,
}

impl Tracer {
    #[must_use]
    pub fn new(
        backend: Arc<dyn TraceBackend>,
        monitor: Arc<dyn ResourceMonitor>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            backend,
            monitor,
            config,
            control: Arc::new(SessionControl::new()),
            store: AggregationStore::new(),
            worker: None,
        }
    }

    /// Start tracing `pid`, stopping any previous session first.
    ///
    /// The focus thread is kept across targets.
    pub fn start(&mut self, pid: Pid) {
        self.stop();

        // The previous worker is joined: nothing else touches the store now
        self.store.reset();
        self.control.set_pid(pid);
        self.control.set_state(SessionState::Preparing);
        self.control.request_exit(false);

        let backend = Arc::clone(&self.backend);
        let store = self.store.clone();
        let control = Arc::clone(&self.control);
        let config = self.config;
        let spawned = std::thread::Builder::new()
            .name(format!("livetrace-sampler-{}", pid.0))
            .spawn(move || run_worker(backend, pid, store, control, config));

        match spawned {
            Ok(handle) => {
                info!("Started session for {pid}");
                self.worker = Some(handle);
            }
            Err(e) => {
                warn!("Cannot spawn sampling thread: {e}");
                self.store.set_error(format!("cannot spawn sampling thread: {e}"));
                self.control.set_state(SessionState::Failed);
            }
        }
    }

    /// Change the focus thread; effective on the next iteration
    pub fn select(&self, tid: Tid) {
        self.control.set_focus(tid);
    }

    /// Toggle pause/resume; returns the resulting state
    pub fn pause(&self) -> SessionState {
        self.control.toggle_pause()
    }

    /// Stop the session from any state; blocks until the worker has exited.
    ///
    /// Afterwards the state is `exited` and the PID is 0. Collected samples
    /// stay readable until the next `start`.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.control.request_exit(true);
            if worker.join().is_err() {
                warn!("Sampling thread panicked");
            }
            info!("Stopped session for {}", self.control.pid());
        }
        self.control.set_state(SessionState::Exited);
        self.control.set_pid(Pid(0));
        self.store.lock().process_name.clear();
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.control.pid()
    }

    #[must_use]
    pub fn focus(&self) -> Tid {
        Tid(self.control.focus())
    }

    /// A consistent view of the session for rendering
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.control, &self.store, self.monitor.as_ref())
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        self.stop();
    }
}
