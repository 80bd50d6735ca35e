//! The progress tracker and its background machinery.
//!
//! One `ProgressTracker` owns one live content session. Updates are applied
//! locally at once, then coalesced by a debounce timer into saves that a
//! single worker sends to the server one at a time.

mod deferred;
mod flush;
mod polling;
mod shared;
mod snapshot;
mod tracker;

pub use deferred::FlushHandle;
pub use snapshot::{SessionGuard, SessionSnapshot};
pub use tracker::ProgressTracker;
