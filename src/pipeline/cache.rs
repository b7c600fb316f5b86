//! Analysis result cache.
//!
//! Keyed by a fingerprint of (first 200 characters of input, instructions):
//! a repeated analysis of the same text within a session must not trigger a
//! second expensive model call, stale-but-identical results being the
//! accepted trade. Unlike the behavior it replaces, the cache is an
//! explicitly injected component with a `Mutex`-guarded map, a TTL and a
//! capacity bound — not an unbounded process global.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::AnalysisResult;

/// Characters of input text that participate in the fingerprint.
pub const FINGERPRINT_PREFIX_CHARS: usize = 200;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_CAPACITY: usize = 256;

/// Cache key for one (text, instructions) pair.
pub fn fingerprint(text: &str, instructions: &str) -> String {
    let prefix: String = text.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
    format!("{prefix}\u{1f}{instructions}")
}

struct CacheSlot {
    result: AnalysisResult,
    inserted_at: Instant,
    // Insertion sequence; `Instant` is too coarse to order back-to-back
    // inserts, so eviction goes by this instead.
    seq: u64,
}

/// Shared, bounded analysis cache. Lives for the process lifetime; entries
/// expire after the TTL, and the oldest entry is evicted at capacity.
pub struct AnalysisCache {
    slots: Mutex<HashMap<String, CacheSlot>>,
    ttl: Duration,
    capacity: usize,
    next_seq: std::sync::atomic::AtomicU64,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl AnalysisCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
            capacity,
            next_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Fetch a live entry; expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<AnalysisResult> {
        let mut slots = self.slots.lock().ok()?;
        match slots.get(key) {
            Some(slot) if slot.inserted_at.elapsed() < self.ttl => Some(slot.result.clone()),
            Some(_) => {
                slots.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert, evicting the oldest entry when the capacity is reached.
    pub fn insert(&self, key: String, result: AnalysisResult) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        if slots.len() >= self.capacity && !slots.contains_key(&key) {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.seq)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                slots.remove(&oldest);
            }
        }
        let seq = self
            .next_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        slots.insert(
            key,
            CacheSlot {
                result,
                inserted_at: Instant::now(),
                seq,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }
    }
}
