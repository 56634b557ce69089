//! Analysis logic for profiling data
//!
//! Pure functions over snapshots, separated from the TUI presentation layer.

pub mod hot_path;

pub use hot_path::{frame_label, frame_source, rank, rank_snapshot, HotPath};
