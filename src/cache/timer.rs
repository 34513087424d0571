//! Timer Queue Module
//!
//! Min-heap of expiry deadlines checked lazily against a monotonic clock.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

use crate::cache::entry::{Timer, TimerHandle};

/// Heap slack tolerated before cancelled timers are compacted away.
const COMPACTION_SLACK: usize = 64;

// == Timer Queue ==
/// Schedules expiry deadlines for cache keys.
///
/// Cancelled timers stay in the heap until they surface or the heap is
/// compacted; only handles present in `live` ever fire.
#[derive(Debug)]
pub struct TimerQueue<K> {
    next_handle: u64,
    heap: BinaryHeap<Reverse<(Instant, TimerHandle)>>,
    live: HashMap<TimerHandle, (K, Instant)>,
}

impl<K: Clone> TimerQueue<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            heap: BinaryHeap::new(),
            live: HashMap::new(),
        }
    }

    // == Schedule ==
    /// Schedules `key` to fire at `deadline` and returns the new timer.
    pub fn schedule(&mut self, key: K, deadline: Instant) -> Timer {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        self.heap.push(Reverse((deadline, handle)));
        self.live.insert(handle, (key, deadline));

        Timer { handle, deadline }
    }

    // == Cancel ==
    /// Cancels a timer. Safe to call any number of times.
    pub fn cancel(&mut self, handle: TimerHandle) {
        if self.live.remove(&handle).is_some()
            && self.heap.len() > self.live.len() * 2 + COMPACTION_SLACK
        {
            self.compact();
        }
    }

    // == Pop Due ==
    /// Pops the next timer whose deadline is at or before `now`.
    ///
    /// Returns the key it was scheduled for, skipping cancelled timers.
    pub fn pop_due(&mut self, now: Instant) -> Option<K> {
        while let Some(Reverse((deadline, handle))) = self.heap.peek().copied() {
            if deadline > now {
                return None;
            }
            self.heap.pop();
            if let Some((key, _)) = self.live.remove(&handle) {
                return Some(key);
            }
        }
        None
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    // == Length ==
    /// Number of timers that are still scheduled.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Rebuilds the heap from live timers only.
    fn compact(&mut self) {
        self.heap = self
            .live
            .iter()
            .map(|(handle, (_, deadline))| Reverse((*deadline, *handle)))
            .collect();
    }
}

impl<K: Clone> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
