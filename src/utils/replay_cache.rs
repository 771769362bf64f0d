//! Stream timestamp table for signature replay protection.
//!
//! Each signed stream, keyed by (link id, source system, source component),
//! remembers the highest timestamp accepted from it. A frame whose timestamp is
//! not strictly newer is a replay.
//!
//! The table is bounded: once `max_entries` streams are tracked, the stream
//! updated least recently is evicted. An evicted stream that reappears is
//! treated as new again, so it must pass the new-stream plausibility window.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Identity of one signed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub link_id: u8,
    pub system_id: u8,
    pub component_id: u8,
}

impl StreamKey {
    pub fn new(link_id: u8, system_id: u8, component_id: u8) -> Self {
        Self {
            link_id,
            system_id,
            component_id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StreamEntry {
    timestamp: u64,
    /// Generation of the latest touch; older queue entries for this key are stale
    generation: u64,
}

/// Bounded map of stream key -> last accepted timestamp, with
/// least-recently-updated eviction.
///
/// Recency is tracked with a queue of (key, generation) pairs. Updating a key
/// pushes a fresh pair and leaves the old one behind as stale; eviction pops
/// from the front, skipping stale pairs. Both operations are amortized O(1).
#[derive(Debug)]
pub struct StreamTimestamps {
    entries: HashMap<StreamKey, StreamEntry>,
    recency: VecDeque<(StreamKey, u64)>,
    next_generation: u64,
    max_entries: usize,
}

impl StreamTimestamps {
    /// Default bound on tracked streams
    pub const DEFAULT_MAX_ENTRIES: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: VecDeque::new(),
            next_generation: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Last accepted timestamp for `key`, if the stream is known.
    pub fn get(&self, key: &StreamKey) -> Option<u64> {
        self.entries.get(key).map(|e| e.timestamp)
    }

    /// Record an accepted timestamp, evicting the stalest stream if full.
    pub fn record(&mut self, key: StreamKey, timestamp: u64) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_one();
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            key,
            StreamEntry {
                timestamp,
                generation,
            },
        );
        self.recency.push_back((key, generation));

        // Stale pairs accumulate when few keys are updated often
        if self.recency.len() > self.max_entries.saturating_mul(2) + 16 {
            self.compact();
        }
    }

    fn evict_one(&mut self) {
        while let Some((key, generation)) = self.recency.pop_front() {
            let current = self.entries.get(&key).map(|e| e.generation);
            if current == Some(generation) {
                self.entries.remove(&key);
                debug!(?key, "Evicted least recently updated signing stream");
                return;
            }
        }
    }

    fn compact(&mut self) {
        let entries = &self.entries;
        self.recency
            .retain(|(key, generation)| entries.get(key).map(|e| e.generation) == Some(*generation));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        debug!("Stream timestamp table cleared");
    }
}

impl Default for StreamTimestamps {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the stream table
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub entries: usize,
    pub max_entries: usize,
}
