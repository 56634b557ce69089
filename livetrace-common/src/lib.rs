//! # Shared Data Model (Sampler ↔ Consumers)
//!
//! Plain data types exchanged between the sampling engine and whatever renders
//! its output (terminal UI, JSON transport, tests). Nothing in here performs
//! I/O or synchronization; the engine decides how these values are shared.
//!
//! ## Key Types
//!
//! - [`SessionState`] - Lifecycle of the single tracing session
//! - [`ThreadSample`] - Cheap per-iteration summary of one thread
//! - [`StackFrame`] - One captured frame, linked to a [`Symbol`] by address
//! - [`Symbol`] - Immutable resolved metadata for an instruction address
//! - [`ProcessInfo`] / [`ThreadInfo`] - Point-in-time process listing entries
//!
//! Enable the `serde` feature to derive `Serialize`/`Deserialize` for all of them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Sampling Constants
// ============================================================================

/// Maximum number of frames captured for the focus thread per sample
pub const MAX_STACK_FRAMES: usize = 256;

/// Frames captured for every thread that is not the focus thread
pub const NON_FOCUS_STACK_FRAMES: usize = 1;

/// Sleep between two sampling iterations, in milliseconds
///
/// Bounds both the sampling resolution and the shutdown latency of `stop()`.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1;

/// How often a live consumer asks for a fresh snapshot, in milliseconds
pub const SNAPSHOT_POLL_INTERVAL_MS: u64 = 120;

/// Number of entries shown in the inclusive/exclusive rankings
pub const RANKING_LIMIT: usize = 20;

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle of the tracing session
///
/// ```text
/// preparing ──attach ok──▶ running ◀──pause()──▶ paused
///     │                      │
///     │                      └──fatal binding error──▶ failed
///     └──────── stop() from any state ──────────────▶ exited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum SessionState {
    /// Session created, attach in progress
    Preparing = 0,
    /// Sampling loop active
    Running = 1,
    /// Sampling loop alive but skipping all work
    Paused = 2,
    /// No active session (never started, stopped, or target gone)
    #[default]
    Exited = 3,
    /// Attach or sampling failed; the message is retained for the next snapshot
    Failed = 4,
}

impl SessionState {
    /// Encode for storage in an `AtomicU8`
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a value produced by [`SessionState::as_u8`]
    ///
    /// Unknown values decode as `Exited`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Preparing,
            1 => Self::Running,
            2 => Self::Paused,
            4 => Self::Failed,
            _ => Self::Exited,
        }
    }

    /// True while a sampling worker owns the target
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Preparing | Self::Running | Self::Paused)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preparing => "Preparing",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Exited => "Exited",
            Self::Failed => "Failed",
        }
    }
}

// ============================================================================
// Sampling Data
// ============================================================================

/// Per-iteration summary of one thread of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadSample {
    /// OS thread id
    pub thread_id: u32,

    /// CPU consumption reported by the binding (best-effort, 0 when unknown)
    pub cycles: u64,

    /// Innermost instruction address captured this iteration
    pub top_instruction_offset: u64,
}

/// One frame of a captured call stack
///
/// Frames are ordered innermost first: index 0 is the currently executing
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StackFrame {
    /// Instruction address of this frame
    pub instruction_offset: u64,

    /// Address execution returns to when this frame exits (0 if unknown)
    pub return_offset: u64,

    /// Frame base address (0 if unknown)
    pub frame_offset: u64,

    /// Stack address at which this frame was found
    pub stack_offset: u64,

    /// Function table entry reported by the unwinder (0 if none)
    pub func_table_entry: u64,

    /// Synthesized frame (for example an inlined call site)
    pub is_virtual: bool,

    /// Position in the captured stack, 0 = innermost
    pub frame_number: u32,

    /// Key into the symbol table, `None` while unresolved
    ///
    /// This is always the frame's own `instruction_offset` once resolved; it
    /// is a lookup key and never owns the symbol.
    pub symbol: Option<u64>,
}

/// Resolved metadata for one instruction address
///
/// Immutable once created; a symbol table keeps exactly one per address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symbol {
    /// Source file, empty when line information is unavailable
    pub source_file: String,

    /// Source line, 0 when line information is unavailable
    pub source_line: u64,

    /// Demangled name of the enclosing function
    pub function_name: String,

    /// Start address of the enclosing function
    pub function_start_address: u64,

    /// Offset of the instruction from the function start
    pub displacement: u64,
}

impl Symbol {
    /// `function+0xdisp`, the usual way to name a sampled address
    #[must_use]
    pub fn label(&self) -> String {
        if self.function_name.is_empty() {
            format!("0x{:x}", self.function_start_address.wrapping_add(self.displacement))
        } else {
            format!("{}+0x{:x}", self.function_name, self.displacement)
        }
    }

    /// `file:line`, or `None` without line information
    #[must_use]
    pub fn source(&self) -> Option<String> {
        if self.source_file.is_empty() {
            None
        } else {
            Some(format!("{}:{}", self.source_file, self.source_line))
        }
    }
}

// ============================================================================
// Process Listing
// ============================================================================

/// A thread entry of a process listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadInfo {
    pub id: u32,
    pub owner_process_id: u32,
    pub base_priority: i32,
    pub flags: u32,
}

/// A process entry of a process listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProcessInfo {
    pub id: u32,
    pub parent_id: u32,
    /// Executable name (basename) used for rule matching
    pub image_name: String,
    pub base_priority: i32,
    pub flags: u32,
    pub threads: Vec<ThreadInfo>,
}
