//! Tour-date pipeline.
//!
//! - `dates` / `normalize`: raw records to canonical events
//! - `diff`: new and updated events against the snapshot and ledger
//! - `format`: chat-sized rendering
//! - `circuit_breaker` / `retry`: refresh safety
//! - `refresh`: the guarded cycle tying it together

mod circuit_breaker;
pub mod dates;
mod diff;
mod format;
mod normalize;
mod refresh;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
pub use diff::{Delta, DiffCalculator, SnapshotDiff, new_events, snapshot_diff};
pub use format::{Chunks, Collection, Formatter, filter_by_month};
pub use normalize::{Normalized, Skipped, merge_events, normalize_batch, normalize_record};
pub use refresh::{Monitor, RefreshOptions, RefreshReport};
pub use retry::RetryPolicy;
