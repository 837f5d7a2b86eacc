//! Two-tier TTL cache
//!
//! Provides a `CacheManager` that keeps entries in memory and mirrors them to
//! an optional persistent [`CacheStore`]. Expiry is checked lazily at read
//! time. Persistence failures are logged and the cache carries on in memory.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::store::{CacheStore, FileStore, StoreError};

/// Default time-to-live for cache entries
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Key holding the cache schema version
pub const CACHE_VERSION_KEY: &str = "cache_version";

/// Wrapper stored in both tiers: `{ data, timestamp, expiresAt }`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached
    timestamp: DateTime<Utc>,
    /// When the cache entry expires
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of a non-evicting read, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// Manages cached values across an in-memory tier and a persistent tier
///
/// Entries are immutable once stored: `set` replaces the whole entry. Reads
/// hand out freshly deserialized copies, so callers can never mutate what
/// the cache holds. Concurrent writers to one key are last-writer-wins.
#[derive(Debug)]
pub struct CacheManager {
    memory: Mutex<HashMap<String, CacheEntry<Value>>>,
    store: Option<Arc<dyn CacheStore>>,
    default_ttl: Duration,
}

impl CacheManager {
    /// Creates a cache backed by the given persistent store
    pub fn new(store: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store,
            default_ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// Creates a memory-only cache
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Creates a cache persisted to files in a custom directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self::new(Some(Arc::new(FileStore::with_dir(cache_dir))))
    }

    /// Overrides the TTL used when `set` is called without one
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<Value>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `data` under `key` with expiry `now + ttl` (default TTL when `None`)
    ///
    /// Never fails: serialization and persistence problems are logged, and a
    /// persistence failure leaves the entry in memory only.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "cache value could not be serialized; skipping");
                return;
            }
        };

        let now = Utc::now();
        let entry = CacheEntry {
            data,
            timestamp: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
        };

        self.persist(key, &entry);
        self.memory().insert(key.to_string(), entry);
    }

    fn persist(&self, key: &str, entry: &CacheEntry<Value>) {
        let Some(store) = &self.store else {
            return;
        };
        let result = serde_json::to_string(entry)
            .map_err(StoreError::from)
            .and_then(|payload| store.save(key, &payload));
        if let Err(err) = result {
            warn!(key, error = %err, "cache persistence failed; keeping entry in memory only");
        }
    }

    /// Finds an entry in memory, hydrating it from the persistent tier on a miss
    fn lookup(&self, key: &str) -> Option<CacheEntry<Value>> {
        if let Some(entry) = self.memory().get(key) {
            return Some(entry.clone());
        }

        let store = self.store.as_ref()?;
        let payload = match store.load(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "cache store read failed");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<Value>>(&payload) {
            Ok(entry) => {
                debug!(key, "hydrated cache entry from persistent store");
                self.memory().insert(key.to_string(), entry.clone());
                Some(entry)
            }
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable persisted cache entry");
                if let Err(err) = store.remove(key) {
                    warn!(key, error = %err, "cache store remove failed");
                }
                None
            }
        }
    }

    fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(key, error = %err, "cached value has an unexpected shape");
                None
            }
        }
    }

    /// Returns the cached value if present and not expired
    ///
    /// An expired entry is evicted from both tiers and `None` is returned.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.lookup(key)?;
        if entry.is_expired_at(Utc::now()) {
            debug!(key, "cache entry expired; evicting");
            self.delete(key);
            return None;
        }
        Self::decode(key, entry.data)
    }

    /// Reads an entry without evicting it, even when expired
    ///
    /// The `is_expired` flag lets callers fall back to stale data when a
    /// fresh fetch is impossible.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let entry = self.lookup(key)?;
        let is_expired = entry.is_expired_at(Utc::now());
        let data = Self::decode(key, entry.data)?;
        Some(CachedData {
            data,
            cached_at: entry.timestamp,
            is_expired,
        })
    }

    /// `true` when `get` would return a value
    pub fn has(&self, key: &str) -> bool {
        self.get::<Value>(key).is_some()
    }

    /// Removes one entry from both tiers
    pub fn delete(&self, key: &str) {
        self.memory().remove(key);
        if let Some(store) = &self.store {
            if let Err(err) = store.remove(key) {
                warn!(key, error = %err, "cache store remove failed");
            }
        }
    }

    /// Removes every entry from both tiers
    pub fn clear(&self) {
        self.memory().clear();
        if let Some(store) = &self.store {
            if let Err(err) = store.clear() {
                warn!(error = %err, "cache store clear failed");
            }
        }
    }

    /// Removes entries whose key starts with `prefix` from both tiers
    pub fn clear_prefix(&self, prefix: &str) {
        let mut keys: BTreeSet<String> = self
            .memory()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        if let Some(store) = &self.store {
            match store.keys() {
                Ok(stored) => {
                    keys.extend(stored.into_iter().filter(|key| key.starts_with(prefix)));
                }
                Err(err) => warn!(prefix, error = %err, "cache store listing failed"),
            }
        }
        for key in keys {
            self.delete(&key);
        }
    }

    /// Time since the entry was created, from the memory tier only
    pub fn get_age(&self, key: &str) -> Option<Duration> {
        self.memory()
            .get(key)
            .map(|entry| Utc::now() - entry.timestamp)
    }

    /// `true` when the entry is missing from memory or older than `threshold`
    ///
    /// `threshold` defaults to 80% of the default TTL.
    pub fn is_stale(&self, key: &str, threshold: Option<Duration>) -> bool {
        let threshold = threshold.unwrap_or(self.default_ttl * 4 / 5);
        match self.get_age(key) {
            Some(age) => age > threshold,
            None => true,
        }
    }

    /// Clears the cache when the stored schema version differs from `expected`
    ///
    /// Returns `true` if the cache was cleared. The expected version is
    /// recorded afterwards so later runs see a match.
    pub fn ensure_version(&self, expected: u32) -> bool {
        let stored = self.read::<u32>(CACHE_VERSION_KEY).map(|cached| cached.data);
        if stored == Some(expected) {
            return false;
        }
        match stored {
            Some(stored) => warn!(stored, expected, "cache version mismatch; clearing cached data"),
            None => debug!(expected, "no cache version recorded; starting clean"),
        }
        self.clear();
        self.store_version(expected);
        true
    }

    /// Records `version` as the current cache schema version
    pub fn store_version(&self, version: u32) {
        self.set(CACHE_VERSION_KEY, &version, Some(Duration::days(3650)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    /// Store whose writes always fail, as a full disk or quota would
    #[derive(Debug)]
    struct FailingStore;

    impl CacheStore for FailingStore {
        fn load(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk unavailable")))
        }

        fn save(&self, _key: &str, payload: &str) -> Result<(), StoreError> {
            Err(StoreError::QuotaExceeded {
                size: payload.len(),
                limit: 0,
            })
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk unavailable")))
        }

        fn clear(&self) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk unavailable")))
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk unavailable")))
        }
    }

    fn create_test_cache() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheManager::with_dir(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    fn sample(name: &str, value: i32) -> TestData {
        TestData {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let (cache, _temp_dir) = create_test_cache();
        let data = sample("roundtrip", 12345);

        cache.set("roundtrip_key", &data, None);

        assert_eq!(cache.get::<TestData>("roundtrip_key"), Some(data));
        assert!(cache.has("roundtrip_key"));
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache();
        assert!(cache.get::<TestData>("nonexistent_key").is_none());
        assert!(!cache.has("nonexistent_key"));
    }

    #[test]
    fn test_set_writes_persisted_entry_format() {
        let (cache, temp_dir) = create_test_cache();

        cache.set("fmt", &sample("fmt", 1), None);

        let content = fs::read_to_string(temp_dir.path().join("cache_fmt.json"))
            .expect("persisted file should exist");
        let json: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["data"]["name"], "fmt");
        assert!(json.get("timestamp").is_some());
        assert!(json.get("expiresAt").is_some());
    }

    #[test]
    fn test_expired_entry_is_evicted_from_both_tiers() {
        let (cache, temp_dir) = create_test_cache();

        cache.set("expiring", &sample("old", 0), Some(Duration::milliseconds(5)));
        thread::sleep(StdDuration::from_millis(20));

        assert!(cache.get::<TestData>("expiring").is_none());
        assert!(!cache.has("expiring"));
        assert!(cache.get_age("expiring").is_none());
        assert!(!temp_dir.path().join("cache_expiring.json").exists());
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let cache = CacheManager::in_memory();
        cache.set("zero", &1u32, Some(Duration::zero()));
        assert!(cache.get::<u32>("zero").is_none());
    }

    #[test]
    fn test_read_returns_expired_entries_without_evicting() {
        let cache = CacheManager::in_memory();
        cache.set("stale", &sample("stale", 7), Some(Duration::zero()));

        let first = cache.read::<TestData>("stale").expect("stale read");
        assert!(first.is_expired);
        assert_eq!(first.data, sample("stale", 7));

        // still there for a second stale read
        assert!(cache.read::<TestData>("stale").is_some());
    }

    #[test]
    fn test_hydrates_from_persistent_tier() {
        let temp_dir = TempDir::new().unwrap();
        let writer = CacheManager::with_dir(temp_dir.path().to_path_buf());
        writer.set("shared", &sample("persisted", 3), None);

        let reader = CacheManager::with_dir(temp_dir.path().to_path_buf());
        assert!(reader.get_age("shared").is_none());
        assert_eq!(reader.get::<TestData>("shared"), Some(sample("persisted", 3)));
        assert!(reader.get_age("shared").is_some());
    }

    #[test]
    fn test_expired_persisted_entry_is_not_trusted() {
        let temp_dir = TempDir::new().unwrap();
        let writer = CacheManager::with_dir(temp_dir.path().to_path_buf());
        writer.set("old", &sample("old", 1), Some(Duration::zero()));

        let reader = CacheManager::with_dir(temp_dir.path().to_path_buf());
        assert!(reader.get::<TestData>("old").is_none());
        assert!(!temp_dir.path().join("cache_old.json").exists());
    }

    #[test]
    fn test_corrupt_persisted_entry_is_discarded() {
        let (cache, temp_dir) = create_test_cache();
        fs::write(temp_dir.path().join("cache_bad.json"), "{ not json").unwrap();

        assert!(cache.get::<TestData>("bad").is_none());
        assert!(!temp_dir.path().join("cache_bad.json").exists());
    }

    #[test]
    fn test_persistence_failure_degrades_to_memory() {
        let cache = CacheManager::new(Some(Arc::new(FailingStore)));

        cache.set("k", &sample("mem", 9), None);
        cache.delete("missing");
        cache.clear_prefix("x");

        assert_eq!(cache.get::<TestData>("k"), Some(sample("mem", 9)));
        cache.clear();
        assert!(cache.get::<TestData>("k").is_none());
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let (cache, _temp_dir) = create_test_cache();
        cache.set("overwrite_key", &sample("first", 1), None);
        cache.set("overwrite_key", &sample("second", 2), None);

        assert_eq!(
            cache.get::<TestData>("overwrite_key"),
            Some(sample("second", 2))
        );
    }

    #[test]
    fn test_shape_mismatch_returns_none() {
        let cache = CacheManager::in_memory();
        cache.set("num", &5u32, None);
        assert!(cache.get::<TestData>("num").is_none());
    }

    #[test]
    fn test_delete_and_clear() {
        let (cache, temp_dir) = create_test_cache();
        cache.set("a", &1u32, None);
        cache.set("b", &2u32, None);

        cache.delete("a");
        assert!(!cache.has("a"));
        assert!(cache.has("b"));

        cache.clear();
        assert!(!cache.has("b"));
        assert!(!temp_dir.path().join("cache_b.json").exists());
    }

    #[test]
    fn test_clear_prefix_is_targeted() {
        let cache = CacheManager::in_memory();
        cache.set("worldbank_A", &1u32, None);
        cache.set("worldbank_B", &2u32, None);
        cache.set("imf_A", &3u32, None);

        cache.clear_prefix("worldbank_");

        assert!(!cache.has("worldbank_A"));
        assert!(!cache.has("worldbank_B"));
        assert!(cache.has("imf_A"));
    }

    #[test]
    fn test_clear_prefix_reaches_entries_only_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let writer = CacheManager::with_dir(temp_dir.path().to_path_buf());
        writer.set("fred_policy_rate", &1u32, None);
        writer.set("imf_LUR", &2u32, None);

        // fresh instance: nothing in memory yet
        let cache = CacheManager::with_dir(temp_dir.path().to_path_buf());
        cache.clear_prefix("fred_");

        assert!(!cache.has("fred_policy_rate"));
        assert!(!temp_dir.path().join("cache_fred_policy_rate.json").exists());
        assert!(cache.has("imf_LUR"));
    }

    #[test]
    fn test_get_age_and_staleness() {
        let cache = CacheManager::in_memory().with_default_ttl(Duration::milliseconds(50));
        cache.set("aging", &1u32, Some(Duration::hours(1)));

        let age = cache.get_age("aging").expect("age should be known");
        assert!(age >= Duration::zero());
        assert!(!cache.is_stale("aging", Some(Duration::hours(1))));

        thread::sleep(StdDuration::from_millis(60));
        // default threshold is 80% of the 50ms default TTL
        assert!(cache.is_stale("aging", None));
        assert!(cache.is_stale("never-set", None));
    }

    #[test]
    fn test_ensure_version_clears_on_mismatch() {
        let (cache, _temp_dir) = create_test_cache();
        cache.store_version(1);
        cache.set("bundle", &sample("old-shape", 1), None);

        assert!(!cache.ensure_version(1));
        assert!(cache.has("bundle"));

        assert!(cache.ensure_version(2));
        assert!(!cache.has("bundle"));
        assert!(!cache.ensure_version(2));
    }

    #[test]
    fn test_ensure_version_on_empty_cache_records_version() {
        let cache = CacheManager::in_memory();
        assert!(cache.ensure_version(4));
        assert_eq!(cache.get::<u32>(CACHE_VERSION_KEY), Some(4));
    }
}
