//! # Aggregation Store
//!
//! The only state shared between the sampling worker and its readers. One
//! coarse lock guards everything a snapshot exposes:
//!
//! - the latest per-thread summaries and the focus thread's stack
//! - inclusive/exclusive hit counts, kept per focus thread
//! - the symbol table (see [`super::symbol_cache`])
//! - the sample counter, start time, target name and retained error
//!
//! Each critical section is a handful of map updates, never I/O.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use livetrace_common::{StackFrame, Symbol, ThreadSample};

/// Hit counts keyed by instruction address
pub type HitCounts = BTreeMap<u64, u64>;

/// Everything guarded by the aggregation lock
#[derive(Debug)]
pub struct SessionData {
    pub process_name: String,
    pub started_at: Instant,
    pub sample_count: u64,
    pub threads: Vec<ThreadSample>,
    pub focus_stack: Vec<StackFrame>,
    /// Per focus thread; switching focus keeps the other threads' history
    pub inclusive: HashMap<u32, HitCounts>,
    pub exclusive: HashMap<u32, HitCounts>,
    /// Append-only within a session
    pub symbols: BTreeMap<u64, Arc<Symbol>>,
    /// Why the session failed, kept until the next start
    pub error: Option<String>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            process_name: String::new(),
            started_at: Instant::now(),
            sample_count: 0,
            threads: Vec::new(),
            focus_stack: Vec::new(),
            inclusive: HashMap::new(),
            exclusive: HashMap::new(),
            symbols: BTreeMap::new(),
            error: None,
        }
    }
}

/// The results of one pass over all threads of the target
#[derive(Debug, Default)]
pub struct Iteration {
    /// One entry per thread that produced at least one frame
    pub threads: Vec<ThreadSample>,
    /// The focus thread's frames, innermost first, if it was seen at all
    pub focus: Option<(u32, Vec<StackFrame>)>,
}

/// Shared handle to the session data
#[derive(Debug, Clone, Default)]
pub struct AggregationStore {
    inner: Arc<Mutex<SessionData>>,
}

impl AggregationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session data.
    ///
    /// Every writer leaves the data consistent before releasing the lock, so
    /// a poisoned lock is still safe to use.
    pub fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear everything for a new session; the clock restarts now.
    pub fn reset(&self) {
        *self.lock() = SessionData::default();
    }

    /// Publish one sampling iteration.
    ///
    /// The thread summaries are replaced, the sample counter incremented and
    /// the focus thread's counts updated in a single critical section.
    /// `discard` is evaluated under the lock; when it returns true the
    /// iteration is dropped entirely (the session was paused meanwhile).
    ///
    /// Returns true if the iteration was recorded.
    pub fn record_iteration(&self, iteration: Iteration, discard: impl FnOnce() -> bool) -> bool {
        let mut data = self.lock();
        if discard() {
            return false;
        }

        if let Some((focus, frames)) = iteration.focus {
            if let Some(innermost) = frames.first() {
                *data.exclusive.entry(focus).or_default().entry(innermost.instruction_offset).or_insert(0) += 1;
                // Recursive frames count once per sample
                let addresses: BTreeSet<u64> = frames.iter().map(|f| f.instruction_offset).collect();
                let inclusive = data.inclusive.entry(focus).or_default();
                for address in addresses {
                    *inclusive.entry(address).or_insert(0) += 1;
                }
            }
            data.focus_stack = frames;
        }

        data.threads = iteration.threads;
        data.sample_count += 1;
        true
    }

    /// Remember the target's name once attached
    pub fn set_process_name(&self, name: String) {
        self.lock().process_name = name;
    }

    /// Retain the reason the session failed
    pub fn set_error(&self, message: String) {
        self.lock().error = Some(message);
    }
}
