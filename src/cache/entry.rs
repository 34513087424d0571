//! Cache Entry Module
//!
//! Defines a single cache entry and the expiry timers attached to it.

use tokio::time::Instant;

// == Timer Handle ==
/// Identifies one scheduled expiry.
///
/// Handles are never reused, so cancelling a handle that already fired (or
/// was already cancelled) is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u64);

// == Timer ==
/// A scheduled expiry: its handle and the monotonic deadline it fires at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub handle: TimerHandle,
    pub deadline: Instant,
}

// == Cache Entry ==
/// Represents a single cache entry with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Monotonic insertion timestamp
    pub inserted_at: Instant,
    /// Position in insertion order, used for overflow eviction
    pub(crate) sequence: u64,
    /// Sliding expiry, rescheduled on every read
    pub(crate) sliding_timer: Option<Timer>,
    /// Absolute expiry, never rescheduled
    pub(crate) absolute_timer: Option<Timer>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry without timers; the store attaches them after insertion.
    pub(crate) fn new(value: V, inserted_at: Instant, sequence: u64) -> Self {
        Self {
            value,
            inserted_at,
            sequence,
            sliding_timer: None,
            absolute_timer: None,
        }
    }

    // == Is Expired ==
    /// Checks whether either deadline has been reached at `now`.
    ///
    /// An entry is expired once `now >= deadline`, matching the point at
    /// which its timer becomes due.
    pub fn is_expired(&self, now: Instant) -> bool {
        [self.sliding_timer, self.absolute_timer]
            .iter()
            .flatten()
            .any(|timer| now >= timer.deadline)
    }

    // == Next Deadline ==
    /// Returns the earliest of the two deadlines, or None if the entry never expires.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.sliding_timer, self.absolute_timer]
            .iter()
            .flatten()
            .map(|timer| timer.deadline)
            .min()
    }

    /// Handles of every timer currently attached to this entry.
    pub(crate) fn timer_handles(&self) -> impl Iterator<Item = TimerHandle> {
        [self.sliding_timer, self.absolute_timer]
            .into_iter()
            .flatten()
            .map(|timer| timer.handle)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timer(id: u64, deadline: Instant) -> Timer {
        Timer {
            handle: TimerHandle(id),
            deadline,
        }
    }

    #[test]
    fn test_entry_without_timers_never_expires() {
        let now = Instant::now();
        let entry = CacheEntry::new("value", now, 0);

        assert!(!entry.is_expired(now + Duration::from_secs(3600)));
        assert!(entry.next_deadline().is_none());
        assert_eq!(entry.timer_handles().count(), 0);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let mut entry = CacheEntry::new("value", now, 0);
        entry.sliding_timer = Some(timer(1, now + Duration::from_millis(10)));

        assert!(!entry.is_expired(now + Duration::from_millis(9)));
        // Expired exactly at the deadline
        assert!(entry.is_expired(now + Duration::from_millis(10)));
    }

    #[test]
    fn test_absolute_deadline_dominates() {
        let now = Instant::now();
        let mut entry = CacheEntry::new(1u32, now, 0);
        entry.sliding_timer = Some(timer(1, now + Duration::from_millis(1000)));
        entry.absolute_timer = Some(timer(2, now + Duration::from_millis(500)));

        assert_eq!(entry.next_deadline(), Some(now + Duration::from_millis(500)));
        assert!(entry.is_expired(now + Duration::from_millis(500)));
        assert_eq!(entry.timer_handles().count(), 2);
    }
}
