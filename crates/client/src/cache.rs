//! Expiring in-memory cache with dependency invalidation.
//!
//! Sits in front of full-table reads so repeated lookups within a context do
//! not go back to the store. Values are type-erased behind `Arc` so one cache
//! can hold row tables, indexes and derived aggregates side by side.
//!
//! ## Expiry
//!
//! An entry is valid while `now - inserted_at < ttl`. The TTL is the entry's
//! own override or the cache default. Expired entries are dropped on the read
//! that finds them, or in bulk by [`DataCache::purge_expired`].
//!
//! Expiry travels along dependency edges: an entry derived from an expired
//! entry is no longer served, even while its own TTL has time left. Dropping
//! an expired entry drops everything derived from it.
//!
//! ## Dependencies
//!
//! `add_dependency(dependent, upon)` records that `dependent` is derived from
//! `upon`. [`DataCache::invalidate_with_dependencies`] removes a key and its
//! direct dependents; [`DataCache::invalidate_cascade`] follows edges until
//! nothing new is reachable.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dispatch_core::config::CacheConfig;
use serde::{Deserialize, Serialize};

type Value = Arc<dyn Any + Send + Sync>;

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Hit/miss counters and sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub dependency_edges: usize,
}

/// Time-expiring key/value cache with dependency edges.
pub struct DataCache {
    entries: HashMap<String, CacheEntry>,
    /// upon key -> keys derived from it
    dependents: HashMap<String, HashSet<String>>,
    /// dependent key -> keys it was derived from
    sources: HashMap<String, HashSet<String>>,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("entries", &self.entries.len())
            .field("dependents", &self.dependents)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl DataCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            dependents: HashMap::new(),
            sources: HashMap::new(),
            default_ttl,
            hits: 0,
            misses: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `ttl` overrides the default time-to-live for this entry only.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T, ttl: Option<Duration>) -> Arc<T> {
        let value = Arc::new(value);
        self.set_arc(key, Arc::clone(&value), ttl);
        value
    }

    /// Like [`DataCache::set`] for a value that is already shared.
    pub fn set_arc<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: Arc<T>, ttl: Option<Duration>) {
        let entry = CacheEntry { value, inserted_at: Instant::now(), ttl: ttl.unwrap_or(self.default_ttl) };
        self.entries.insert(key.into(), entry);
    }

    /// Returns the cached value if present, unexpired, derived from nothing
    /// expired, and of type `T`.
    ///
    /// `None` is the miss sentinel.
    pub fn get<T: Any + Send + Sync>(&mut self, key: &str) -> Option<Arc<T>> {
        if !self.entries.contains_key(key) {
            self.misses += 1;
            return None;
        }

        let stale = self.expired_roots(key);
        if !stale.is_empty() {
            for root in &stale {
                self.invalidate_cascade(root);
            }
            self.misses += 1;
            tracing::trace!(key, expired = ?stale, "cache entry expired");
            return None;
        }

        let value = self.entries.get(key).map(|e| Arc::clone(&e.value))?;
        match value.downcast::<T>() {
            Ok(v) => {
                self.hits += 1;
                Some(v)
            }
            Err(_) => {
                self.misses += 1;
                tracing::warn!(key, "cache entry has unexpected type");
                None
            }
        }
    }

    /// Whether `key` holds an entry that [`DataCache::get`] would serve.
    /// Does not touch the counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key) && self.expired_roots(key).is_empty()
    }

    /// Expired entries among `key` and everything it was derived from,
    /// following source edges transitively.
    fn expired_roots(&self, key: &str) -> Vec<String> {
        let mut expired = Vec::new();
        let mut seen = HashSet::from([key.to_string()]);
        let mut queue = VecDeque::from([key.to_string()]);

        while let Some(current) = queue.pop_front() {
            if self.entries.get(&current).is_some_and(CacheEntry::is_expired) {
                expired.push(current.clone());
            }
            for source in self.sources.get(&current).into_iter().flatten() {
                if seen.insert(source.clone()) {
                    queue.push_back(source.clone());
                }
            }
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers that `dependent_key` goes stale whenever `upon_key` is invalidated.
    ///
    /// Edges outlive the entries they name; they are dropped by [`DataCache::clear`].
    pub fn add_dependency(&mut self, dependent_key: impl Into<String>, upon_key: impl Into<String>) {
        let dependent_key = dependent_key.into();
        let upon_key = upon_key.into();
        if dependent_key == upon_key {
            return;
        }
        self.sources.entry(dependent_key.clone()).or_default().insert(upon_key.clone());
        self.dependents.entry(upon_key).or_default().insert(dependent_key);
    }

    /// Keys registered as depending directly on `key`, sorted.
    pub fn dependents_of(&self, key: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .dependents
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Removes a single key. Returns whether an entry was present.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes `key` and every key registered as depending on it, one hop deep.
    ///
    /// Returns the removed keys that actually held an entry, `key` first.
    pub fn invalidate_with_dependencies(&mut self, key: &str) -> Vec<String> {
        let mut removed = Vec::new();
        if self.invalidate(key) {
            removed.push(key.to_string());
        }
        for dependent in self.dependents_of(key) {
            if self.invalidate(&dependent) {
                removed.push(dependent);
            }
        }
        tracing::debug!(key, removed = removed.len(), "invalidated with dependencies");
        removed
    }

    /// Removes `key` and everything reachable from it through dependency edges.
    ///
    /// Breadth-first; cycles are visited once.
    pub fn invalidate_cascade(&mut self, key: &str) -> Vec<String> {
        let mut removed = Vec::new();
        let mut seen = HashSet::from([key.to_string()]);
        let mut queue = VecDeque::from([key.to_string()]);

        while let Some(current) = queue.pop_front() {
            if self.invalidate(&current) {
                removed.push(current.clone());
            }
            for next in self.dependents_of(&current) {
                if seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        tracing::debug!(key, removed = removed.len(), "invalidated cascade");
        removed
    }

    /// Drops every expired entry and everything derived from one. Returns how
    /// many entries were removed.
    pub fn purge_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        expired.iter().map(|key| self.invalidate_cascade(key).len()).sum()
    }

    /// Drops all entries and dependency edges. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dependents.clear();
        self.sources.clear();
    }

    /// Backdates an entry so tests can cross its TTL without sleeping.
    #[cfg(test)]
    pub(crate) fn age_entry(&mut self, key: &str, by: Duration) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.inserted_at = Instant::now() - by;
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
            dependency_edges: self.dependents.values().map(HashSet::len).sum(),
        }
    }
}
