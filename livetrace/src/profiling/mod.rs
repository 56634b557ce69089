//! Profiling core
//!
//! - [`aggregation`]: the lock-guarded session data shared with readers
//! - [`symbol_cache`]: memoized address → symbol resolution
//! - [`sampler`]: the background sampling loop
//! - [`session`]: the session state machine and its controller handle
//! - [`snapshot`]: consistent, serializable views for the UI

pub mod aggregation;
pub mod sampler;
pub mod session;
pub mod snapshot;
pub mod symbol_cache;

pub use aggregation::{AggregationStore, HitCounts, Iteration};
pub use sampler::{Sampler, SamplerConfig};
pub use session::{SessionControl, Tracer};
pub use snapshot::Snapshot;
pub use symbol_cache::SymbolCache;
