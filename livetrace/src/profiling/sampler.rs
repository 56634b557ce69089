//! # Sampling Loop
//!
//! Runs on a dedicated thread, one per active session:
//!
//! 1. Attach to the target without suspending it and wait for the binding's
//!    attach handshake. Failure ends the session in `failed`.
//! 2. Every `interval`, unless paused: list the target's threads, read their
//!    CPU cycles, capture one frame per thread (up to `max_frames` for the
//!    focus thread), resolve every frame through the symbol cache and publish
//!    the iteration to the aggregation store.
//! 3. On cancellation or a fatal binding error, detach and finish.
//!
//! The sleep interval bounds both the sampling resolution and how long
//! `stop()` waits for the loop to notice cancellation.

use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;

use livetrace_common::{
    SessionState, StackFrame, ThreadSample, DEFAULT_SAMPLE_INTERVAL_MS, MAX_STACK_FRAMES,
    NON_FOCUS_STACK_FRAMES,
};

use super::aggregation::{AggregationStore, Iteration};
use super::session::SessionControl;
use super::symbol_cache::SymbolCache;
use crate::domain::{AttachError, BindingError, Pid, Tid};
use crate::platform::{TraceBackend, TraceSession};

/// Sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Sleep between two iterations
    pub interval: Duration,
    /// Stack depth captured for the focus thread
    pub max_frames: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            max_frames: MAX_STACK_FRAMES,
        }
    }
}

/// A sampling worker bound to one attached target
pub struct Sampler {
    session: Box<dyn TraceSession>,
    symbols: SymbolCache,
    store: AggregationStore,
    control: Arc<SessionControl>,
    config: SamplerConfig,
}

impl Sampler {
    /// Attach to `pid` and wait until the binding is ready
    ///
    /// # Errors
    /// Returns the [`AttachError`] of the attach or the handshake.
    pub fn attach(
        backend: &dyn TraceBackend,
        pid: Pid,
        store: AggregationStore,
        control: Arc<SessionControl>,
        config: SamplerConfig,
    ) -> Result<Self, AttachError> {
        let mut session = backend.attach(pid)?;
        if let Err(e) = session.wait_attached() {
            session.detach();
            return Err(e);
        }
        store.set_process_name(session.process_name());

        Ok(Self { session, symbols: SymbolCache::new(store.clone()), store, control, config })
    }

    /// Sample until cancelled, then detach.
    ///
    /// # Errors
    /// Returns the fatal [`BindingError`] that ended the loop early.
    pub fn run(mut self) -> Result<(), BindingError> {
        let result = self.sample_until_cancelled();
        self.session.detach();
        if !self.symbols.is_empty() {
            debug!("Detached with {} resolved addresses", self.symbols.len());
        }
        result
    }

    fn sample_until_cancelled(&mut self) -> Result<(), BindingError> {
        while !self.control.exit_requested() {
            std::thread::sleep(self.config.interval);

            if self.control.state() == SessionState::Paused {
                continue;
            }

            match self.sample_once() {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Skipping iteration: {e}"),
            }
        }
        Ok(())
    }

    /// Run one sampling iteration over all threads.
    ///
    /// Returns `Ok(false)` when the iteration was dropped because the session
    /// was paused while it ran.
    ///
    /// # Errors
    /// The thread listing failed, or a fatal [`BindingError`] occurred.
    pub fn sample_once(&mut self) -> Result<bool, BindingError> {
        let tids = self.session.thread_ids()?;
        let focus = self.control.focus();

        let mut iteration = Iteration { threads: Vec::with_capacity(tids.len()), focus: None };
        for tid in tids {
            let is_focus = tid.0 == focus;
            let cycles = match self.session.cycles(tid) {
                Ok(cycles) => cycles,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => 0,
            };

            let max_frames = if is_focus { self.config.max_frames } else { NON_FOCUS_STACK_FRAMES };
            let frames = match self.capture(tid, max_frames) {
                Ok(frames) => frames,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    trace!("{tid}: {e}");
                    Vec::new()
                }
            };

            if let Some(top) = frames.first() {
                iteration.threads.push(ThreadSample {
                    thread_id: tid.0,
                    cycles,
                    top_instruction_offset: top.instruction_offset,
                });
            }
            if is_focus {
                iteration.focus = Some((focus, frames));
            }
        }

        let control = &self.control;
        Ok(self.store.record_iteration(iteration, || control.state() == SessionState::Paused))
    }

    /// Capture up to `max_frames` frames of `tid` and resolve their symbols
    fn capture(&mut self, tid: Tid, max_frames: usize) -> Result<Vec<StackFrame>, BindingError> {
        let mut frames = self.session.stack_trace(tid, max_frames)?;
        frames.truncate(max_frames);

        let session = &mut self.session;
        for frame in &mut frames {
            let address = frame.instruction_offset;
            frame.symbol = self.symbols.lookup(address, |a| session.resolve(a)).map(|_| address);
        }
        Ok(frames)
    }
}

/// Body of the sampling thread for one session
///
/// Drives the session's state: `preparing` until attached, then `running`;
/// `failed` (with the message retained in the store) on an attach error or a
/// fatal binding error; otherwise `exited` once cancelled.
pub fn run_worker(
    backend: Arc<dyn TraceBackend>,
    pid: Pid,
    store: AggregationStore,
    control: Arc<SessionControl>,
    config: SamplerConfig,
) {
    let sampler = match Sampler::attach(backend.as_ref(), pid, store.clone(), Arc::clone(&control), config) {
        Ok(sampler) => sampler,
        Err(e) => {
            warn!("Attach to {pid} failed: {e}");
            store.set_error(e.to_string());
            control.set_state(SessionState::Failed);
            return;
        }
    };

    control.mark_running();
    info!("Sampling {pid} every {:?}", config.interval);

    match sampler.run() {
        Ok(()) => control.set_state(SessionState::Exited),
        Err(e @ BindingError::TargetExited(_)) => {
            info!("{e}");
            control.set_state(SessionState::Exited);
        }
        Err(e) => {
            warn!("Sampling {pid} failed: {e}");
            store.set_error(e.to_string());
            control.set_state(SessionState::Failed);
        }
    }
}
