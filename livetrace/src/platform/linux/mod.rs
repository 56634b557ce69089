//! Linux binding backed by procfs
//!
//! Every path is rooted at a configurable proc root (normally `/proc`) so the
//! binding can be pointed at a fake tree in tests.

pub mod memory_maps;
pub mod monitor;
pub mod preflight;
pub mod process_table;
pub mod procfs;
pub mod session;
pub mod symbolizer;

pub use monitor::ProcfsMonitor;
pub use process_table::ProcfsProcessSource;
pub use session::{ProcfsBackend, ProcfsSession};
pub use symbolizer::Symbolizer;
