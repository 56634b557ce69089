//! # Snapshot Builder
//!
//! A point-in-time, self-consistent copy of the session for rendering.
//! Telemetry is polled before the aggregation lock is taken; everything the
//! sampling worker writes is copied inside one critical section.

use serde::Serialize;
use std::collections::BTreeMap;

use livetrace_common::{SessionState, StackFrame, Symbol, ThreadSample};

use super::aggregation::{AggregationStore, HitCounts};
use super::session::SessionControl;
use crate::platform::ResourceMonitor;

/// The serializable view of one session at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub process_id: u32,
    pub process_name: String,
    /// Fraction of total CPU capacity (0.0 - 1.0)
    pub cpu_usage: f64,
    pub phys_mem_usage: u64,
    pub virt_mem_usage: u64,
    pub focus_thread_id: u32,
    /// Milliseconds since the session started
    pub elapsed_time: u64,
    pub sample_count: u64,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub thread_summaries: Vec<ThreadSample>,
    pub symbol_table: BTreeMap<u64, Symbol>,
    pub focus_thread_stack: Vec<StackFrame>,
    pub inclusive_counts: HitCounts,
    pub exclusive_counts: HitCounts,
}

impl Snapshot {
    /// Copy the current session out of `store`
    #[must_use]
    pub fn capture(
        control: &SessionControl,
        store: &AggregationStore,
        monitor: &dyn ResourceMonitor,
    ) -> Self {
        let pid = control.pid();
        let (cpu_usage, phys_mem_usage, virt_mem_usage) = if pid.is_traceable() {
            (monitor.cpu_usage(pid), monitor.phys_mem_usage(pid), monitor.virt_mem_usage(pid))
        } else {
            (0.0, 0, 0)
        };

        let data = store.lock();
        let focus = control.focus();
        Self {
            process_id: pid.0,
            process_name: data.process_name.clone(),
            cpu_usage,
            phys_mem_usage,
            virt_mem_usage,
            focus_thread_id: focus,
            elapsed_time: u64::try_from(data.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            sample_count: data.sample_count,
            state: control.state(),
            error: data.error.clone(),
            thread_summaries: data.threads.clone(),
            symbol_table: data
                .symbols
                .iter()
                .map(|(&address, symbol)| (address, Symbol::clone(symbol)))
                .collect(),
            focus_thread_stack: data.focus_stack.clone(),
            inclusive_counts: data.inclusive.get(&focus).cloned().unwrap_or_default(),
            exclusive_counts: data.exclusive.get(&focus).cloned().unwrap_or_default(),
        }
    }

    /// Resolved symbol of a stack frame
    #[must_use]
    pub fn symbol_of(&self, frame: &StackFrame) -> Option<&Symbol> {
        self.symbol_table.get(&frame.symbol?)
    }

    /// Samples per second since the session started
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_rate(&self) -> f64 {
        if self.elapsed_time == 0 {
            return 0.0;
        }
        self.sample_count as f64 * 1000.0 / self.elapsed_time as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Pid, Tid};
    use crate::profiling::aggregation::Iteration;
    use std::sync::Arc;

    struct FixedMonitor;

    impl ResourceMonitor for FixedMonitor {
        fn cpu_usage(&self, _pid: Pid) -> f64 {
            0.25
        }

        fn phys_mem_usage(&self, _pid: Pid) -> u64 {
            4096
        }

        fn virt_mem_usage(&self, _pid: Pid) -> u64 {
            8192
        }
    }

    fn frame(address: u64, symbol: Option<u64>) -> StackFrame {
        StackFrame { instruction_offset: address, symbol, ..StackFrame::default() }
    }

    #[test]
    fn test_empty_snapshot_without_target() {
        let snapshot = Snapshot::capture(&SessionControl::new(), &AggregationStore::new(), &FixedMonitor);
        assert_eq!(snapshot.process_id, 0);
        assert_eq!(snapshot.state, SessionState::Exited);
        assert_eq!(snapshot.phys_mem_usage, 0);
        assert!(snapshot.thread_summaries.is_empty());
        assert!(snapshot.inclusive_counts.is_empty());
    }

    #[test]
    fn test_snapshot_exposes_only_focus_counts() {
        let control = SessionControl::new();
        let store = AggregationStore::new();
        store.record_iteration(Iteration { threads: vec![], focus: Some((1, vec![frame(0xa, None)])) }, || false);
        store.record_iteration(Iteration { threads: vec![], focus: Some((2, vec![frame(0xb, None)])) }, || false);

        control.set_focus(Tid(2));
        let snapshot = Snapshot::capture(&control, &store, &FixedMonitor);
        assert_eq!(snapshot.sample_count, 2);
        assert_eq!(snapshot.inclusive_counts, HitCounts::from([(0xb, 1)]));

        control.set_focus(Tid(1));
        let snapshot = Snapshot::capture(&control, &store, &FixedMonitor);
        assert_eq!(snapshot.inclusive_counts, HitCounts::from([(0xa, 1)]));
    }

    #[test]
    fn test_symbol_of_frame() {
        let store = AggregationStore::new();
        store.lock().symbols.insert(
            0x10,
            Arc::new(Symbol { function_name: "main".to_string(), ..Symbol::default() }),
        );
        let snapshot = Snapshot::capture(&SessionControl::new(), &store, &FixedMonitor);

        assert_eq!(snapshot.symbol_of(&frame(0x10, Some(0x10))).unwrap().function_name, "main");
        assert!(snapshot.symbol_of(&frame(0x20, None)).is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let control = SessionControl::new();
        control.set_focus(Tid(5));
        let store = AggregationStore::new();
        store.record_iteration(
            Iteration {
                threads: vec![ThreadSample { thread_id: 5, cycles: 1, top_instruction_offset: 0x30 }],
                focus: Some((5, vec![frame(0x30, None)])),
            },
            || false,
        );

        let json = serde_json::to_value(Snapshot::capture(&control, &store, &FixedMonitor)).unwrap();
        assert_eq!(json["state"], "exited");
        assert_eq!(json["focus_thread_id"], 5);
        assert_eq!(json["inclusive_counts"]["48"], 1);
        assert_eq!(json["thread_summaries"][0]["thread_id"], 5);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_sample_rate() {
        let snapshot = Snapshot { sample_count: 500, elapsed_time: 1000, ..Snapshot::default() };
        assert!((snapshot.sample_rate() - 500.0).abs() < f64::EPSILON);
        assert!(Snapshot::default().sample_rate().abs() < f64::EPSILON);
    }
}
