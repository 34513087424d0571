//! Cache Module
//!
//! Provides a generic bounded cache with sliding expiration, an optional
//! absolute TTL and insertion-order eviction.

mod entry;
mod order;
mod stats;
mod store;
mod timer;


// Re-export public types
pub use entry::{CacheEntry, Timer, TimerHandle};
pub use order::InsertionOrder;
pub use stats::CacheStats;
pub use store::{BoundedTtlCache, CacheOptions};
pub use timer::TimerQueue;
