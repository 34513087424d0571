//! Insertion Order Module
//!
//! Tracks insertion order for overflow eviction. Reads do not reorder keys,
//! so the oldest key is the earliest-inserted one, not the least recently used.

use std::collections::BTreeMap;

// == Insertion Order ==
/// Keys indexed by a monotonically increasing insertion sequence.
#[derive(Debug)]
pub struct InsertionOrder<K> {
    next_sequence: u64,
    order: BTreeMap<u64, K>,
}

impl<K> InsertionOrder<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            next_sequence: 0,
            order: BTreeMap::new(),
        }
    }

    // == Push ==
    /// Records a newly inserted key and returns its sequence number.
    pub fn push(&mut self, key: K) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(sequence, key);
        sequence
    }

    // == Remove ==
    /// Forgets the key inserted at `sequence`, if still tracked.
    pub fn remove(&mut self, sequence: u64) -> Option<K> {
        self.order.remove(&sequence)
    }

    // == Pop Oldest ==
    /// Returns and removes the earliest-inserted key.
    pub fn pop_oldest(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    // == Peek Oldest ==
    #[allow(dead_code)]
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.first_key_value().map(|(_, key)| key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl<K> Default for InsertionOrder<K> {
    fn default() -> Self {
        Self::new()
    }
}
