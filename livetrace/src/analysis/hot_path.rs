//! Hot-path rankings for the focus thread.
//!
//! Turns the inclusive/exclusive hit-count maps of a [`Snapshot`] into
//! sorted, labelled rows for display:
//!
//! ```text
//! INCLUSIVE TOP 20
//! ─────────────────────────────────────────────
//!   main+0x2a                 1204  ██████████
//!   app::run+0x13              988  ████████░░
//!   app::parse::line+0x7c      412  ███░░░░░░░
//! ```

// Percentages intentionally convert counts to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use livetrace_common::{StackFrame, Symbol};

use crate::profiling::Snapshot;

// =============================================================================
// HOT PATH ROW
// =============================================================================

/// One ranked address
#[derive(Debug, Clone, PartialEq)]
pub struct HotPath {
    pub address: u64,
    /// `function+0xdisp`, or `0x<addr>` when unresolved
    pub label: String,
    /// `file:line` when known
    pub source: Option<String>,
    pub count: u64,
    /// Relative to the top entry (0.0 - 100.0)
    pub percentage: f64,
}

// =============================================================================
// RANKING
// =============================================================================

/// The `limit` addresses with the highest counts.
///
/// Ties are broken by ascending address so the order is stable between
/// refreshes.
#[must_use]
pub fn rank(counts: &BTreeMap<u64, u64>, symbols: &BTreeMap<u64, Symbol>, limit: usize) -> Vec<HotPath> {
    let mut entries: Vec<(u64, u64)> = counts.iter().map(|(&address, &count)| (address, count)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.truncate(limit);

    let top = entries.first().map_or(0, |&(_, count)| count);
    entries
        .into_iter()
        .map(|(address, count)| {
            let symbol = symbols.get(&address);
            HotPath {
                address,
                label: address_label(address, symbol),
                source: symbol.and_then(Symbol::source),
                count,
                percentage: if top == 0 { 0.0 } else { count as f64 * 100.0 / top as f64 },
            }
        })
        .collect()
}

/// Inclusive and exclusive rankings of a snapshot's focus thread
#[must_use]
pub fn rank_snapshot(snapshot: &Snapshot, limit: usize) -> (Vec<HotPath>, Vec<HotPath>) {
    (
        rank(&snapshot.inclusive_counts, &snapshot.symbol_table, limit),
        rank(&snapshot.exclusive_counts, &snapshot.symbol_table, limit),
    )
}

// =============================================================================
// FRAME LABELS
// =============================================================================

/// Display label for a stack frame
#[must_use]
pub fn frame_label(frame: &StackFrame, snapshot: &Snapshot) -> String {
    address_label(frame.instruction_offset, snapshot.symbol_of(frame))
}

/// `file:line` of a stack frame, if known
#[must_use]
pub fn frame_source(frame: &StackFrame, snapshot: &Snapshot) -> Option<String> {
    snapshot.symbol_of(frame).and_then(Symbol::source)
}

fn address_label(address: u64, symbol: Option<&Symbol>) -> String {
    match symbol {
        Some(symbol) if !symbol.function_name.is_empty() => symbol.label(),
        _ => format!("0x{address:x}"),
    }
}
