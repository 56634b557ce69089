//! # livetrace - Live Sampling Profiler
//!
//! livetrace attaches to a running process without stopping it and samples
//! it continuously: every thread's CPU time and top frame, plus the full call
//! stack of one chosen *focus thread*. Hit counts accumulate per address so
//! the hottest code shows up within seconds.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────┐  JSON commands   ┌──────────────┐
//! │ TUI / stdin   │ ───────────────▶ │  Controller  │
//! │  (transport)  │ ◀─────────────── │  (control)   │
//! └───────────────┘     snapshots    └──────┬───────┘
//!                                           │ start / pause / select / stop
//!                                           ▼
//!                                    ┌──────────────┐     ┌────────────────┐
//!                                    │    Tracer    │────▶│ Sampler thread │
//!                                    │ (profiling)  │     └───────┬────────┘
//!                                    └──────┬───────┘             │ iterations
//!                                           │ snapshot            ▼
//!                                           │            ┌──────────────────┐
//!                                           └───────────▶│ AggregationStore │
//!                                                        │  + SymbolCache   │
//!                                                        └──────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`platform`]: the OS seam. [`platform::TraceBackend`] attaches to a
//!   process, [`platform::ProcessSource`] lists processes and
//!   [`platform::ResourceMonitor`] reads CPU and memory. The Linux binding
//!   reads `/proc` and `process_vm_readv`, and never suspends the target.
//! - [`profiling`]: the tracer, its sampling worker, the aggregation store
//!   and the snapshot handed to front-ends.
//! - [`process_directory`]: point-in-time process list and target rules.
//! - [`control`]: JSON command protocol and dispatch.
//! - [`analysis`]: TOP-N rankings over the hit counts.
//! - [`headless`] and [`tui`]: the two transports.
//! - [`cli`]: command-line arguments.
//! - [`domain`]: `Pid`/`Tid` newtypes and error types.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Trace a process by name with the live view
//! livetrace my-app
//!
//! # Drive a session from a script
//! echo '{"type":"process","rule":"1234"}' | livetrace --headless
//! ```

pub mod analysis;
pub mod cli;
pub mod control;
pub mod domain;
pub mod headless;
pub mod platform;
pub mod process_directory;
pub mod profiling;
pub mod tui;
