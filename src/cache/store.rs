//! Cache Store Module
//!
//! Bounded cache combining HashMap storage with insertion-order eviction,
//! sliding expiration and an optional absolute TTL.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::order::InsertionOrder;
use crate::cache::timer::TimerQueue;
use crate::cache::{CacheEntry, CacheStats};

// == Cache Options ==
/// Sizing and expiry parameters. A zero duration disables that timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Expiry reset on every read
    pub sliding: Duration,
    /// Hard expiry measured from insertion, independent of reads
    pub absolute: Duration,
}

impl CacheOptions {
    pub fn new(max_entries: usize, sliding: Duration, absolute: Duration) -> Self {
        Self {
            max_entries,
            sliding,
            absolute,
        }
    }
}

// == Bounded TTL Cache ==
/// Generic cache with a capacity bound and per-entry expiry timers.
///
/// Timers are deadlines on the tokio monotonic clock. Due timers fire
/// lazily at the start of every operation and through [`purge_expired`],
/// which a background sweep calls on a fixed interval.
///
/// The cache itself is not synchronized; shared owners wrap it in a mutex
/// so a read's sliding reschedule cannot interleave with a delete or sweep.
///
/// [`purge_expired`]: BoundedTtlCache::purge_expired
#[derive(Debug)]
pub struct BoundedTtlCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// Insertion order tracker for overflow eviction
    order: InsertionOrder<K>,
    /// Pending sliding and absolute expiries
    timers: TimerQueue<K>,
    /// Performance statistics
    stats: CacheStats,
    options: CacheOptions,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty cache with the given options.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            timers: TimerQueue::new(),
            stats: CacheStats::new(),
            options,
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    // == Set ==
    /// Stores a value, replacing any previous value and its timers.
    ///
    /// If the key is new and the cache is at capacity, the earliest-inserted
    /// entry is evicted first. An overwrite re-inserts the key, so it moves to
    /// the back of the insertion order. With `max_entries == 0` nothing is stored.
    pub fn set(&mut self, key: K, value: V) {
        let now = Instant::now();
        self.fire_due(now);

        if self.options.max_entries == 0 {
            return;
        }

        // Cancel timers and forget the order slot of the value being replaced
        let is_overwrite = self.remove_entry(&key).is_some();

        if !is_overwrite && self.entries.len() >= self.options.max_entries {
            if let Some(oldest) = self.order.pop_oldest() {
                self.remove_entry(&oldest);
                self.stats.record_eviction();
            }
        }

        let CacheOptions { sliding, absolute, .. } = self.options;
        let sequence = self.order.push(key.clone());
        let mut entry = CacheEntry::new(value, now, sequence);

        if !absolute.is_zero() {
            entry.absolute_timer = Some(self.timers.schedule(key.clone(), now + absolute));
        }
        if !sliding.is_zero() {
            entry.sliding_timer = Some(self.timers.schedule(key.clone(), now + sliding));
        }

        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a clone of the value and refreshes its sliding timer.
    ///
    /// The absolute timer is never rescheduled, so repeated reads cannot keep
    /// an entry alive past its absolute deadline.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.fire_due(now);

        let Some(entry) = self.entries.get_mut(key) else {
            self.stats.record_miss();
            return None;
        };

        if let Some(timer) = entry.sliding_timer.take() {
            self.timers.cancel(timer.handle);
        }
        let sliding = self.options.sliding;
        if !sliding.is_zero() {
            entry.sliding_timer = Some(self.timers.schedule(key.clone(), now + sliding));
        }

        self.stats.record_hit();
        Some(entry.value.clone())
    }

    // == Delete ==
    /// Removes an entry and cancels both of its timers.
    ///
    /// Idempotent: deleting an absent key does nothing and returns false.
    pub fn delete(&mut self, key: &K) -> bool {
        self.fire_due(Instant::now());
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes every entry and cancels every timer.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.timers.clear();
        self.stats.set_total_entries(0);
    }

    // == Contains ==
    /// Checks for a live entry without refreshing its sliding timer.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    // == Purge Expired ==
    /// Fires every timer that is due and returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        self.fire_due(Instant::now())
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.len());
        stats
    }

    // == Length ==
    /// Returns the number of entries that have not expired.
    ///
    /// Entries whose timers are due but have not fired yet are not counted.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes an entry with its timers and order slot.
    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        for handle in entry.timer_handles() {
            self.timers.cancel(handle);
        }
        self.order.remove(entry.sequence);
        self.stats.set_total_entries(self.entries.len());
        Some(entry)
    }

    /// Fires due timers, deleting their entries.
    fn fire_due(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(key) = self.timers.pop_due(now) {
            if self.remove_entry(&key).is_some() {
                self.stats.record_expiration();
                removed += 1;
            }
        }
        removed
    }

    #[cfg(test)]
    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    #[cfg(test)]
    pub(crate) fn tracked_order(&self) -> usize {
        self.order.len()
    }
}
