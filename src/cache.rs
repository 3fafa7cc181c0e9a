//! In-memory render cache keyed by a SHA-256 digest of the input.
//!
//! The key covers the content bytes, the content type and the serialized
//! print options, so any option change produces a fresh render. Entries
//! expire after a TTL; the oldest entry is evicted once the cache is full.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::debug;
use sha2::{Digest, Sha256};

use crate::content::ContentType;
use crate::options::PrintOptions;
use crate::pipeline::RenderResult;

/// Default number of entries kept before eviction.
pub const DEFAULT_CAPACITY: usize = 256;

/// Hex-encoded SHA-256 over content type, options and content.
pub fn cache_key(content: &[u8], content_type: ContentType, options: &PrintOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_type.mime_type().as_bytes());
    hasher.update([0u8]);
    hasher.update(options.to_json().as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    result: RenderResult,
    inserted: Instant,
}

/// Thread-safe TTL cache of finished renders.
pub struct RenderCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RenderCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache configured from `performance.cache_ttl`.
    pub fn from_options(options: &PrintOptions) -> Self {
        Self::new(options.performance.cache_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch a live entry. The returned copy has `cache_hit` set.
    pub fn get(&self, key: &str) -> Option<RenderResult> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.inserted.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(key);
            debug!("Cache entry {} expired", short(key));
            return None;
        }
        entries.get(key).map(|entry| {
            let mut result = entry.result.clone();
            result.cache_hit = true;
            result.output_path = None;
            result
        })
    }

    pub fn insert(&self, key: String, result: &RenderResult) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted.elapsed() <= ttl);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        debug!("Caching render {}", short(&key));
        entries.insert(
            key,
            CacheEntry {
                result: result.clone(),
                inserted: Instant::now(),
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted.elapsed() <= ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::from_options(&PrintOptions::default())
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OutputFormat;

    fn result(bytes: &[u8]) -> RenderResult {
        RenderResult {
            output: bytes.to_vec(),
            output_path: None,
            output_size: bytes.len(),
            page_count: 1,
            render_time: Duration::from_millis(5),
            cache_hit: false,
            format: OutputFormat::Pdf,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn key_depends_on_all_inputs() {
        let opts = PrintOptions::default();
        let a = cache_key(b"<p>x</p>", ContentType::Html, &opts);
        assert_eq!(a.len(), 64);
        assert_eq!(a, cache_key(b"<p>x</p>", ContentType::Html, &opts));
        assert_ne!(a, cache_key(b"<p>y</p>", ContentType::Html, &opts));
        assert_ne!(a, cache_key(b"<p>x</p>", ContentType::Markdown, &opts));
        let mut landscape = PrintOptions::default();
        landscape.page.orientation = crate::options::PageOrientation::Landscape;
        assert_ne!(a, cache_key(b"<p>x</p>", ContentType::Html, &landscape));
    }

    #[test]
    fn hit_sets_flag() {
        let cache = RenderCache::new(Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        cache.insert("k".to_string(), &result(b"abc"));
        let hit = cache.get("k").unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.output, b"abc");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entries_expire() {
        let cache = RenderCache::new(Duration::ZERO);
        cache.insert("k".to_string(), &result(b"abc"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = RenderCache::with_capacity(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), &result(b"1"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), &result(b"2"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), &result(b"3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }
}
