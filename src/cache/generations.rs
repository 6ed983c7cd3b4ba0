//! Named Cache Generations - Versioned Response Storage
//!
//! Cached responses are grouped into named generations (e.g. `holyseeds-v1`).
//! Shipping a new asset set means opening a new generation name and dropping
//! the rest during activation, so stale copies never outlive a deploy.
//!
//! Entries are keyed by request path + query and store the status, headers,
//! and body bytes of the upstream response they were copied from. Lookups
//! are exact-match: `/feed?page=2` and `/feed` are distinct entries.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Records
// ============================================================================

/// A cached copy of one upstream response
#[derive(Debug, Clone)]
pub struct CacheRecord {
    /// HTTP status of the response at capture time
    pub status: u16,
    /// Response headers at capture time, hop-by-hop fields already removed
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
    /// When the copy was stored
    pub stored_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Utc::now(),
        }
    }

    /// Content-Type header value, if the response carried one
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// Generation
// ============================================================================

/// One named generation of cached responses
///
/// Keys are the request path with query string attached, so each variant of
/// a parameterized URL caches independently.
pub struct Generation {
    name: String,
    records: DashMap<String, CacheRecord>,
}

impl Generation {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: DashMap::new(),
        }
    }

    /// Generation name (e.g. `holyseeds-v1`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response copy, replacing any previous entry for the key
    pub fn put(&self, key: &str, record: CacheRecord) {
        debug!(generation = %self.name, key = %key, bytes = record.body.len(), "cache put");
        self.records.insert(key.to_string(), record);
    }

    /// Exact-match lookup
    pub fn lookup(&self, key: &str) -> Option<CacheRecord> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total body bytes held by this generation
    pub fn total_bytes(&self) -> u64 {
        self.records
            .iter()
            .map(|entry| entry.value().body.len() as u64)
            .sum()
    }
}

// ============================================================================
// Generation Store
// ============================================================================

/// All cache generations known to this process
///
/// `open` is idempotent: asking for an existing name returns the live
/// generation rather than clearing it, so a re-run of the install sequence
/// refreshes entries in place.
pub struct GenerationStore {
    generations: DashMap<String, Arc<Generation>>,
}

impl GenerationStore {
    pub fn new() -> Self {
        Self {
            generations: DashMap::new(),
        }
    }

    /// Open a generation by name, creating it if absent
    pub fn open(&self, name: &str) -> Arc<Generation> {
        self.generations
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(generation = %name, "opened cache generation");
                Arc::new(Generation::new(name))
            })
            .value()
            .clone()
    }

    /// List generation names currently held
    pub fn names(&self) -> Vec<String> {
        self.generations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drop one generation and everything in it
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.generations.remove(name).is_some();
        if removed {
            info!(generation = %name, "deleted cache generation");
        }
        removed
    }

    /// Drop every generation except `keep`, returning the names removed
    pub fn delete_others(&self, keep: &str) -> Vec<String> {
        let stale: Vec<String> = self
            .generations
            .iter()
            .filter(|entry| entry.key() != keep)
            .map(|entry| entry.key().clone())
            .collect();

        for name in &stale {
            self.generations.remove(name);
            info!(generation = %name, kept = %keep, "dropped stale cache generation");
        }

        stale
    }
}

impl Default for GenerationStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &str) -> CacheRecord {
        CacheRecord::new(
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_open_is_idempotent() {
        let store = GenerationStore::new();
        let first = store.open("holyseeds-v1");
        first.put("/", record("home"));

        let second = store.open("holyseeds-v1");
        assert_eq!(second.len(), 1);
        assert!(second.lookup("/").is_some());
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let store = GenerationStore::new();
        let generation = store.open("holyseeds-v1");

        generation.put("/offline", record("old"));
        generation.put("/offline", record("new"));

        assert_eq!(generation.len(), 1);
        let hit = generation.lookup("/offline").unwrap();
        assert_eq!(hit.body, Bytes::from("new"));
    }

    #[test]
    fn test_lookup_returns_stored_headers() {
        let store = GenerationStore::new();
        let generation = store.open("holyseeds-v1");
        generation.put(
            "/feed",
            CacheRecord::new(
                200,
                vec![
                    ("content-type".to_string(), "text/html".to_string()),
                    ("etag".to_string(), "\"v1\"".to_string()),
                    ("cache-control".to_string(), "max-age=60".to_string()),
                ],
                Bytes::from("feed"),
            ),
        );

        let hit = generation.lookup("/feed").unwrap();
        assert_eq!(hit.content_type(), Some("text/html"));
        assert!(hit
            .headers
            .contains(&("etag".to_string(), "\"v1\"".to_string())));
        assert!(hit
            .headers
            .contains(&("cache-control".to_string(), "max-age=60".to_string())));
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let store = GenerationStore::new();
        let generation = store.open("holyseeds-v1");
        generation.put("/feed?page=2", record("page two"));

        assert!(generation.lookup("/feed").is_none());
        assert!(generation.lookup("/feed?page=2").is_some());
    }

    #[test]
    fn test_delete_others_keeps_current() {
        let store = GenerationStore::new();
        store.open("holyseeds-v0");
        store.open("holyseeds-v1");
        store.open("experimental");

        let dropped = store.delete_others("holyseeds-v1");

        assert_eq!(dropped.len(), 2);
        assert!(dropped.contains(&"holyseeds-v0".to_string()));
        assert!(dropped.contains(&"experimental".to_string()));
        assert_eq!(store.names(), vec!["holyseeds-v1".to_string()]);
    }

    #[test]
    fn test_delete_missing_generation() {
        let store = GenerationStore::new();
        assert!(!store.delete("never-opened"));
    }

    #[test]
    fn test_total_bytes_accounting() {
        let store = GenerationStore::new();
        let generation = store.open("holyseeds-v1");

        generation.put("/a", record("aaaa"));
        generation.put("/b", record("bb"));

        assert_eq!(generation.total_bytes(), 6);
    }
}
