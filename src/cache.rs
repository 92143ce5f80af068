//! # Result Cache
//! Durable, TTL-bounded memoization of full analysis payloads, keyed by
//! `"analysis:<SYMBOL>"`. The backing store is a single JSON object mapping
//! key → `{data, timestamp}`; every operation loads and rewrites the whole
//! store. Expired entries are deleted lazily by the read that discovers them.
//!
//! Concurrency note: read-modify-write with no locking; two racing writers
//! lose to the last one. Acceptable at this scale. The file store writes via
//! temp-file + rename so a torn write cannot corrupt the map on disk.

use anyhow::{Context, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Fixed TTL applied to all entries.
pub const ANALYSIS_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

pub const DEFAULT_CACHE_PATH: &str = "cache.json";
pub const ENV_CACHE_PATH: &str = "MACROMIND_CACHE_PATH";

/// One persisted entry: opaque payload plus its write time (epoch millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub timestamp: u64,
}

pub type CacheMap = HashMap<String, CacheEntry>;

/// Millisecond clock, injectable so TTL boundaries are testable.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Whole-store load/replace boundary. Implementations must treat an absent
/// backing store as an empty map, never as an error.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<CacheMap>;
    fn save(&self, map: &CacheMap) -> Result<()>;
}

/// JSON file store. Missing file or empty content is an empty map; invalid
/// content is an error the cache above logs and recovers from.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the store path from the environment (or default).
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_CACHE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileStore {
    fn load(&self) -> Result<CacheMap> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheMap::new()),
            Err(e) => return Err(e).context("reading cache file"),
        };
        if raw.trim().is_empty() {
            return Ok(CacheMap::new());
        }
        serde_json::from_str(&raw).context("parsing cache file")
    }

    fn save(&self, map: &CacheMap) -> Result<()> {
        let json = serde_json::to_string_pretty(map).context("serializing cache")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).context("creating cache temp file")?;
        f.write_all(json.as_bytes()).context("writing cache temp file")?;
        fs::rename(&tmp, &self.path).context("replacing cache file")?;
        Ok(())
    }
}

/// In-memory store for tests and the one-shot CLI.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<CacheMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<CacheMap> {
        Ok(self.inner.lock().expect("memory store poisoned").clone())
    }

    fn save(&self, map: &CacheMap) -> Result<()> {
        *self.inner.lock().expect("memory store poisoned") = map.clone();
        Ok(())
    }
}

/// TTL-bounded keyed cache over an arbitrary JSON payload.
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, ANALYSIS_CACHE_TTL_MS, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ttl_ms,
            clock,
        }
    }

    pub fn key_for(symbol: &str) -> String {
        format!("analysis:{symbol}")
    }

    /// Load the store, failing open to an empty map on corrupt content.
    fn load_or_empty(&self) -> CacheMap {
        match self.store.load() {
            Ok(map) => map,
            Err(e) => {
                counter!("analysis_cache_corrupt_total").increment(1);
                warn!(error = %e, "cache store unreadable, starting from empty");
                CacheMap::new()
            }
        }
    }

    /// Returns the payload while `now - stored_at < TTL`; expired entries are
    /// deleted from the backing store before reporting a miss.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut map = self.load_or_empty();
        let Some(entry) = map.get(key) else {
            counter!("analysis_cache_miss_total").increment(1);
            return None;
        };

        let now = self.clock.now_millis();
        if now.saturating_sub(entry.timestamp) >= self.ttl_ms {
            map.remove(key);
            if let Err(e) = self.store.save(&map) {
                warn!(error = %e, "failed to persist lazy cache expiry");
            }
            counter!("analysis_cache_miss_total").increment(1);
            return None;
        }

        counter!("analysis_cache_hit_total").increment(1);
        Some(entry.data.clone())
    }

    /// Overwrites any existing entry for `key` and persists the full store.
    /// Best-effort: a write failure is logged, not propagated.
    pub fn set(&self, key: &str, payload: serde_json::Value) {
        let mut map = self.load_or_empty();
        map.insert(
            key.to_string(),
            CacheEntry {
                data: payload,
                timestamp: self.clock.now_millis(),
            },
        );
        if let Err(e) = self.store.save(&map) {
            warn!(error = %e, "failed to persist cache write");
        }
    }

    /// Raw dump of the backing store (diagnostics and tests).
    pub fn dump(&self) -> CacheMap {
        self.load_or_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn at(millis: u64) -> Arc<Self> {
            Arc::new(Self(AtomicU64::new(millis)))
        }
        fn set(&self, millis: u64) {
            self.0.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn cache_at(clock: Arc<ManualClock>) -> ResultCache {
        ResultCache::with_clock(
            Arc::new(MemoryStore::new()),
            ANALYSIS_CACHE_TTL_MS,
            clock,
        )
    }

    #[test]
    fn hit_just_inside_ttl_miss_just_past_it() {
        let clock = ManualClock::at(1_000);
        let cache = cache_at(clock.clone());
        let payload = json!({"signals": {"systemDriver": "macro"}});

        cache.set("analysis:X", payload.clone());

        clock.set(1_000 + 299_999);
        assert_eq!(cache.get("analysis:X"), Some(payload.clone()));

        clock.set(1_000 + 300_001);
        assert_eq!(cache.get("analysis:X"), None);
        assert!(
            !cache.dump().contains_key("analysis:X"),
            "expired entry must be deleted from the store"
        );
    }

    #[test]
    fn boundary_is_inclusive_for_expiry() {
        let clock = ManualClock::at(0);
        let cache = cache_at(clock.clone());
        cache.set("analysis:X", json!(1));

        clock.set(ANALYSIS_CACHE_TTL_MS);
        assert_eq!(cache.get("analysis:X"), None, "now - stored == TTL is a miss");
    }

    #[test]
    fn round_trip_is_deep_equal() {
        let clock = ManualClock::at(42);
        let cache = cache_at(clock);
        let payload = json!({
            "request": {"ticker": "AAPL", "timeframe": "1d"},
            "news": [{"id": "news:1", "title": "t"}],
            "evidence": {"headlineScore": -2},
        });
        cache.set("analysis:AAPL", payload.clone());
        assert_eq!(cache.get("analysis:AAPL"), Some(payload));
    }

    #[test]
    fn set_overwrites_and_refreshes_timestamp() {
        let clock = ManualClock::at(0);
        let cache = cache_at(clock.clone());
        cache.set("analysis:X", json!("old"));

        clock.set(200_000);
        cache.set("analysis:X", json!("new"));

        // 250s after the second write: old entry would be expired, new is not.
        clock.set(200_000 + 250_000);
        assert_eq!(cache.get("analysis:X"), Some(json!("new")));
    }

    #[test]
    fn other_keys_survive_a_lazy_expiry() {
        let clock = ManualClock::at(0);
        let cache = cache_at(clock.clone());
        cache.set("analysis:OLD", json!(1));

        clock.set(250_000);
        cache.set("analysis:NEW", json!(2));

        clock.set(320_000);
        assert_eq!(cache.get("analysis:OLD"), None);
        assert_eq!(cache.get("analysis:NEW"), Some(json!(2)));
        let dump = cache.dump();
        assert!(!dump.contains_key("analysis:OLD"));
        assert!(dump.contains_key("analysis:NEW"));
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let store = FileStore::new("/definitely/not/here/cache.json");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trip_and_layout() {
        let dir = std::env::temp_dir().join(format!("macromind-cache-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");

        let store = FileStore::new(&path);
        let mut map = CacheMap::new();
        map.insert(
            "analysis:AAPL".to_string(),
            CacheEntry {
                data: json!({"ok": true}),
                timestamp: 123,
            },
        );
        store.save(&map).unwrap();

        // Persisted layout: {"analysis:AAPL": {"data": ..., "timestamp": ...}}
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["analysis:AAPL"]["timestamp"], json!(123));
        assert_eq!(raw["analysis:AAPL"]["data"]["ok"], json!(true));

        assert_eq!(store.load().unwrap(), map);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_fails_open_to_empty_cache() {
        let dir = std::env::temp_dir().join(format!("macromind-corrupt-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");
        fs::write(&path, "{ this is not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.load().is_err(), "corrupt content must surface as error");

        let cache = ResultCache::new(Arc::new(FileStore::new(&path)));
        assert_eq!(cache.get("analysis:X"), None, "cache must fail open");

        // A subsequent write repairs the store.
        cache.set("analysis:X", json!(1));
        assert_eq!(cache.get("analysis:X"), Some(json!(1)));

        let _ = fs::remove_dir_all(&dir);
    }
}
