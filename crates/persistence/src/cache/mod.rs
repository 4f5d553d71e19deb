//! In-memory caching layer for short-lived per-account state
//!
//! Expiry is measured against caller-supplied timestamps so the same clock
//! drives the engine and its tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jobquest_core::{AssessmentSession, Result};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

/// Cached item with expiration
struct CacheEntry<T> {
    value: T,
    touched_at: DateTime<Utc>,
}

/// Thread-safe map with a sliding TTL and a max-entry bound
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.touched_at > self.ttl
    }

    /// Get a value if present and not expired
    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let cache = self.entries.read().ok()?;
        let entry = cache.get(key)?;

        if self.is_expired(entry, now) {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    /// Insert or replace a value, restarting its TTL.
    /// Evicts expired entries (then the oldest one) when at capacity.
    pub fn insert(&self, key: K, value: V, now: DateTime<Utc>) {
        if let Ok(mut cache) = self.entries.write() {
            if cache.len() >= self.max_entries && !cache.contains_key(&key) {
                cache.retain(|_, entry| now - entry.touched_at <= self.ttl);
            }

            if cache.len() >= self.max_entries && !cache.contains_key(&key) {
                if let Some(oldest_key) = cache
                    .iter()
                    .min_by_key(|(_, e)| e.touched_at)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest_key);
                }
            }

            cache.insert(
                key,
                CacheEntry {
                    value,
                    touched_at: now,
                },
            );
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries
            .write()
            .ok()
            .and_then(|mut cache| cache.remove(key))
            .map(|e| e.value)
    }

    /// Drop expired entries; returns how many were removed
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        match self.entries.write() {
            Ok(mut cache) => {
                let before = cache.len();
                cache.retain(|_, entry| now - entry.touched_at <= self.ttl);
                before - cache.len()
            }
            Err(_) => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Backing store for assessment sessions keyed by account id.
///
/// The in-process map below serves single-instance deployments; a shared
/// cache can implement the same trait for several instances.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, account_id: i64, now: DateTime<Utc>) -> Result<Option<AssessmentSession>>;
    async fn save(&self, session: AssessmentSession, now: DateTime<Utc>) -> Result<()>;
    async fn delete(&self, account_id: i64) -> Result<()>;
    /// Evict expired sessions, returning how many went away
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Process-local session store with TTL expiry
pub struct InMemorySessionStore {
    sessions: TtlCache<i64, AssessmentSession>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            sessions: TtlCache::with_capacity(ttl, max_entries),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        // 30 minutes idle, 10k concurrent dialogues
        Self::new(Duration::minutes(30), 10_000)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, account_id: i64, now: DateTime<Utc>) -> Result<Option<AssessmentSession>> {
        Ok(self.sessions.get(&account_id, now))
    }

    async fn save(&self, session: AssessmentSession, now: DateTime<Utc>) -> Result<()> {
        self.sessions.insert(session.account_id, session, now);
        Ok(())
    }

    async fn delete(&self, account_id: i64) -> Result<()> {
        self.sessions.remove(&account_id);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.sessions.cleanup(now))
    }
}
