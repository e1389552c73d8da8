//! TTL cache for completed analyses.
//!
//! The cache stores derived [`AnalysisResult`]s only, never raw documents,
//! which bounds memory to a few kilobytes per bill. Keys are canonical
//! (identifier, session) strings, so any raw input that normalizes to the
//! same bill hits the same entry. Expiry is lazy: an expired entry is
//! discarded by the read that finds it; there is no sweeper.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::analysis::AnalysisResult;
use crate::identifier::BillIdentifier;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct CacheEntry {
    value: Arc<AnalysisResult>,
    expires_at: Instant,
    hit_count: u64,
}

/// Hit/miss accounting exposed through the service contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Concurrent TTL cache keyed by canonical identifier.
pub struct AnalysisCache {
    entries: Mutex<FxHashMap<String, CacheEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnalysisCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up an unexpired result. An expired entry counts as a miss and is
    /// removed on the spot.
    pub fn get(&self, identifier: &BillIdentifier) -> Option<Arc<AnalysisResult>> {
        let key = identifier.cache_key();
        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.value))
            }
            Some(_) => {
                debug!(key = %key, "cache entry expired, discarding");
                entries.remove(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a result under the default TTL.
    pub fn put(&self, result: Arc<AnalysisResult>) {
        self.put_with_ttl(result, self.default_ttl);
    }

    /// Store a result with an explicit TTL for this entry.
    pub fn put_with_ttl(&self, result: Arc<AnalysisResult>, ttl: Duration) {
        let key = result.identifier.cache_key();
        let entry = CacheEntry {
            value: result,
            expires_at: Instant::now() + ttl,
            hit_count: 0,
        };
        self.entries.lock().insert(key, entry);
    }

    /// Drop the entry for `identifier`. Returns whether one existed.
    pub fn invalidate(&self, identifier: &BillIdentifier) -> bool {
        self.entries.lock().remove(&identifier.cache_key()).is_some()
    }

    /// Number of stored entries, including any not yet lazily expired.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
