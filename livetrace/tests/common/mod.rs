//! Scripted in-memory platform for integration tests.
//!
//! A [`FakeBackend`] serves one or more fake targets. Every target has a
//! fixed thread list and a stack per thread that a test may swap at any time.
//! Attach, detach and resolve calls are journaled so tests can check the
//! order of lifecycle events and how often symbols were resolved.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use livetrace::domain::{AttachError, BindingError, EnumerationError, Pid, Tid};
use livetrace::platform::{ProcessSource, ResourceMonitor, TraceBackend, TraceSession};
use livetrace::profiling::{SamplerConfig, Tracer};
use livetrace_common::{ProcessInfo, SessionState, StackFrame, Symbol, ThreadInfo};

/// Lifecycle events, in the order the backend saw them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Attach(u32),
    Detach(u32),
    /// One completed thread listing (one sampling iteration started)
    Iteration(u32),
}

/// How a fake target misbehaves
#[derive(Debug, Clone, Default)]
pub enum Fault {
    #[default]
    None,
    /// `attach` fails with permission denied
    AttachDenied,
    /// `thread_ids` reports the target gone
    Exits,
    /// `thread_ids` reports the session lost
    Lost,
}

#[derive(Debug, Default)]
struct Target {
    name: String,
    threads: Vec<u32>,
    stacks: HashMap<u32, Vec<u64>>,
    fault: Fault,
}

#[derive(Default)]
struct Inner {
    targets: HashMap<u32, Target>,
    /// Symbol names by function start; a function covers 0x100 bytes
    functions: HashMap<u64, String>,
    events: Vec<Event>,
    resolves: HashMap<u64, usize>,
    /// When set, `wait_attached` blocks until the test sends on the paired sender
    gate: Option<Receiver<()>>,
}

/// Backend + process source + monitor over scripted targets
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target whose threads all sit in `stack` (innermost first)
    pub fn add_target(&self, pid: u32, name: &str, threads: &[u32], stack: &[u64]) {
        let target = Target {
            name: name.to_string(),
            threads: threads.to_vec(),
            stacks: threads.iter().map(|&tid| (tid, stack.to_vec())).collect(),
            fault: Fault::None,
        };
        self.inner.lock().unwrap().targets.insert(pid, target);
    }

    pub fn set_stack(&self, pid: u32, tid: u32, stack: &[u64]) {
        let mut inner = self.inner.lock().unwrap();
        inner.targets.get_mut(&pid).unwrap().stacks.insert(tid, stack.to_vec());
    }

    pub fn set_fault(&self, pid: u32, fault: Fault) {
        self.inner.lock().unwrap().targets.get_mut(&pid).unwrap().fault = fault;
    }

    pub fn add_function(&self, start: u64, name: &str) {
        self.inner.lock().unwrap().functions.insert(start, name.to_string());
    }

    /// Make the next attach handshakes block until the returned sender fires
    pub fn gate_attach(&self) -> Sender<()> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.inner.lock().unwrap().gate = Some(rx);
        tx
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn resolve_count(&self, address: u64) -> usize {
        self.inner.lock().unwrap().resolves.get(&address).copied().unwrap_or(0)
    }

    pub fn tracer(&self) -> Tracer {
        Tracer::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            SamplerConfig { interval: Duration::from_millis(1), ..SamplerConfig::default() },
        )
    }
}

impl TraceBackend for FakeBackend {
    fn attach(&self, pid: Pid) -> Result<Box<dyn TraceSession>, AttachError> {
        let mut inner = self.inner.lock().unwrap();
        let target = inner.targets.get(&pid.0).ok_or(AttachError::ProcessNotFound(pid))?;
        if matches!(target.fault, Fault::AttachDenied) {
            return Err(AttachError::PermissionDenied { pid, reason: "scripted".to_string() });
        }
        let name = target.name.clone();
        let gate = inner.gate.clone();
        inner.events.push(Event::Attach(pid.0));
        Ok(Box::new(FakeSession { backend: self.clone(), pid: pid.0, name, gate }))
    }
}

struct FakeSession {
    backend: FakeBackend,
    pid: u32,
    name: String,
    gate: Option<Receiver<()>>,
}

impl TraceSession for FakeSession {
    fn process_name(&self) -> String {
        self.name.clone()
    }

    fn wait_attached(&mut self) -> Result<(), AttachError> {
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| AttachError::Failed { pid: Pid(self.pid), reason: "gate dropped".to_string() })?;
        }
        Ok(())
    }

    fn thread_ids(&mut self) -> Result<Vec<Tid>, BindingError> {
        let mut inner = self.backend.inner.lock().unwrap();
        let target = inner.targets.get(&self.pid).ok_or(BindingError::TargetExited(Pid(self.pid)))?;
        match target.fault {
            Fault::Exits => return Err(BindingError::TargetExited(Pid(self.pid))),
            Fault::Lost => {
                return Err(BindingError::SessionLost { pid: Pid(self.pid), reason: "scripted".to_string() })
            }
            Fault::None | Fault::AttachDenied => {}
        }
        let threads = target.threads.iter().copied().map(Tid).collect();
        inner.events.push(Event::Iteration(self.pid));
        Ok(threads)
    }

    fn cycles(&mut self, tid: Tid) -> Result<u64, BindingError> {
        Ok(u64::from(tid.0) * 1000)
    }

    fn stack_trace(&mut self, tid: Tid, max_frames: usize) -> Result<Vec<StackFrame>, BindingError> {
        let inner = self.backend.inner.lock().unwrap();
        let stack = inner
            .targets
            .get(&self.pid)
            .and_then(|t| t.stacks.get(&tid.0))
            .ok_or(BindingError::ThreadUnavailable(tid))?;
        Ok(stack
            .iter()
            .take(max_frames)
            .enumerate()
            .map(|(n, &address)| StackFrame {
                instruction_offset: address,
                frame_number: u32::try_from(n).unwrap(),
                ..StackFrame::default()
            })
            .collect())
    }

    fn resolve(&mut self, address: u64) -> Option<Symbol> {
        let mut inner = self.backend.inner.lock().unwrap();
        *inner.resolves.entry(address).or_insert(0) += 1;
        let start = address & !0xff;
        let name = inner.functions.get(&start)?.clone();
        Some(Symbol {
            source_file: "/src/app/main.rs".to_string(),
            source_line: start / 0x100,
            function_name: name,
            function_start_address: start,
            displacement: address - start,
        })
    }

    fn detach(&mut self) {
        self.backend.inner.lock().unwrap().events.push(Event::Detach(self.pid));
    }
}

impl ProcessSource for FakeBackend {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, EnumerationError> {
        let inner = self.inner.lock().unwrap();
        let mut processes: Vec<ProcessInfo> = inner
            .targets
            .iter()
            .map(|(&pid, target)| ProcessInfo {
                id: pid,
                parent_id: 1,
                image_name: target.name.clone(),
                base_priority: 20,
                flags: 0,
                threads: target
                    .threads
                    .iter()
                    .map(|&id| ThreadInfo { id, owner_process_id: pid, base_priority: 20, flags: 0 })
                    .collect(),
            })
            .collect();
        processes.sort_by_key(|p| p.id);
        Ok(processes)
    }
}

impl ResourceMonitor for FakeBackend {
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

/// Poll until `condition` holds, failing the test after 5 seconds
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

pub fn wait_for_state(tracer: &Tracer, state: SessionState) {
    wait_until(&format!("state {}", state.label()), || tracer.state() == state);
}

/// Wait until the session has recorded at least `count` iterations
pub fn wait_for_samples(tracer: &Tracer, count: u64) {
    wait_until(&format!("{count} samples"), || tracer.snapshot().sample_count >= count);
}
