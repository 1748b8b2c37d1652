//! Named-graph resolution cache fed by sidecar declarations.
//!
//! Maps a data file's base name to the graph URI declared by its `*.graph`
//! sidecar. Bounded in two ways: entries idle longer than the time-to-idle
//! are gone on next lookup, and beyond capacity the least-recently-used
//! entry is evicted first. Populated only by the loader's sidecar step;
//! lookups never mutate the mapping.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

pub const GRAPH_CACHE_CAPACITY: usize = 1000;
pub const GRAPH_CACHE_TIME_TO_IDLE: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    graph: String,
    touched_at: Instant,
}

pub struct GraphNameCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    time_to_idle: Duration,
}

impl Default for GraphNameCache {
    fn default() -> Self {
        Self::new(GRAPH_CACHE_CAPACITY, GRAPH_CACHE_TIME_TO_IDLE)
    }
}

impl GraphNameCache {
    pub fn new(capacity: usize, time_to_idle: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be > 0");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            time_to_idle,
        }
    }

    /// Record a sidecar declaration for a base file name.
    pub fn put(&self, base_name: impl Into<String>, graph: impl Into<String>) {
        let mut inner = self.inner.lock().expect("graph cache poisoned");
        inner.put(
            base_name.into(),
            CacheEntry {
                graph: graph.into(),
                touched_at: Instant::now(),
            },
        );
    }

    /// Look up the declared graph for a base file name, refreshing its
    /// recency and idle clock. Entries idle beyond the time-to-idle are
    /// removed and reported absent.
    pub fn get(&self, base_name: &str) -> Option<String> {
        let mut inner = self.inner.lock().expect("graph cache poisoned");
        match inner.get_mut(base_name) {
            Some(entry) if entry.touched_at.elapsed() <= self.time_to_idle => {
                entry.touched_at = Instant::now();
                Some(entry.graph.clone())
            }
            Some(_) => {
                inner.pop(base_name);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("graph cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_entries_expire() {
        let cache = GraphNameCache::new(10, Duration::from_millis(20));
        cache.put("people", "urn:graph:people");
        assert_eq!(cache.get("people").as_deref(), Some("urn:graph:people"));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("people"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn access_refreshes_the_idle_clock() {
        let cache = GraphNameCache::new(10, Duration::from_millis(60));
        cache.put("people", "urn:graph:people");

        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(30));
            assert!(cache.get("people").is_some());
        }
    }

    #[test]
    fn least_recently_used_entry_is_evicted_beyond_capacity() {
        let cache = GraphNameCache::new(3, Duration::from_secs(60));
        cache.put("a", "urn:graph:a");
        cache.put("b", "urn:graph:b");
        cache.put("c", "urn:graph:c");

        // Touch "a" so "b" becomes the least recently used entry.
        assert!(cache.get("a").is_some());
        cache.put("d", "urn:graph:d");

        assert_eq!(cache.get("b"), None);
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn lookups_do_not_create_entries() {
        let cache = GraphNameCache::default();
        assert_eq!(cache.get("missing"), None);
        assert!(cache.is_empty());
    }
}
