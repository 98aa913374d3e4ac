use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Settings;
use crate::data::models::MessageType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    pub response: String,
    pub message_type: MessageType,
    pub confidence_score: Option<f32>,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// TTL cache for answered questions, keyed on a digest of the normalized
/// question so trivially different phrasings of the same string hit.
pub struct ResponseCache {
    enabled: bool,
    cache: Cache<String, CachedResponse>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(settings: &Settings) -> Self {
        ResponseCache {
            enabled: settings.enable_cache,
            cache: Cache::builder()
                .max_capacity(settings.cache_max_entries)
                .time_to_live(Duration::from_secs(settings.cache_ttl_seconds))
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn cache_key(question: &str) -> String {
        let normalized = question.trim().to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());

        let mut key = String::with_capacity(64);
        for byte in digest {
            key.push_str(&format!("{:02x}", byte));
        }
        key
    }

    pub fn get(&self, question: &str) -> Option<CachedResponse> {
        if !self.enabled {
            return None;
        }

        match self.cache.get(&Self::cache_key(question)) {
            Some(cached) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(cached)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put<S: Into<String>>(
        &self,
        question: &str,
        response: S,
        message_type: MessageType,
        confidence_score: Option<f32>,
    ) {
        if !self.enabled {
            return;
        }

        self.cache.insert(
            Self::cache_key(question),
            CachedResponse {
                response: response.into(),
                message_type,
                confidence_score,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn invalidate(&self, question: &str) {
        self.cache.invalidate(&Self::cache_key(question));
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache() -> ResponseCache {
        ResponseCache::new(&Settings::default())
    }

    #[test]
    fn cached_responses_come_back() {
        let cache = cache();
        cache.put("What is Rust?", "a language", MessageType::Professional, Some(0.9));

        let cached = cache.get("What is Rust?").unwrap();
        assert_eq!(cached.response, "a language");
        assert_eq!(cached.message_type, MessageType::Professional);
        assert_eq!(cached.confidence_score, Some(0.9));
    }

    #[test]
    fn keys_normalize_case_and_whitespace() {
        let cache = cache();
        cache.put("  What is Rust? ", "a language", MessageType::General, None);

        assert!(cache.get("what is rust?").is_some());
        assert!(cache.get("what is go?").is_none());
    }

    #[test]
    fn a_disabled_cache_never_hits() {
        let mut settings = Settings::default();
        settings.enable_cache = false;
        let cache = ResponseCache::new(&settings);

        cache.put("question", "response", MessageType::General, None);
        assert!(cache.get("question").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn invalidation_removes_single_entries() {
        let cache = cache();
        cache.put("q1", "r1", MessageType::General, None);
        cache.put("q2", "r2", MessageType::General, None);

        cache.invalidate("q1");
        assert!(cache.get("q1").is_none());
        assert!(cache.get("q2").is_some());

        cache.clear();
        assert!(cache.get("q2").is_none());
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = cache();
        cache.put("q1", "r1", MessageType::General, None);

        cache.get("q1");
        cache.get("q1");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn entries_expire_after_the_ttl() {
        let mut settings = Settings::default();
        settings.cache_ttl_seconds = 1;
        let cache = ResponseCache::new(&settings);

        cache.put("q1", "r1", MessageType::General, None);
        assert!(cache.get("q1").is_some());

        std::thread::sleep(Duration::from_millis(1100));
        assert!(cache.get("q1").is_none());
    }
}
