//! Parameter Store: last-resolved parameters per (connection, table).
//!
//! The calling framework strips inline directives when it compiles a saved
//! query and re-issues the bare table query on refresh. The store bridges
//! that gap: the first explicit resolution is remembered for a while and
//! supplies the missing context to later directive-free calls.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::params::ParameterSet;

/// Default entry lifetime (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Identity of a virtual table within a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub connection_id: String,
    pub endpoint: String,
}

impl StoreKey {
    pub fn new(connection_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub params: ParameterSet,
    pub inserted_at: Instant,
}

/// Concurrent map of resolved parameter sets with per-entry expiry.
///
/// Each entry is replaced as a whole under its shard lock, so a reader of a
/// key sees either the previous set or the new one, never a mix.
#[derive(Debug)]
pub struct ParameterStore {
    entries: DashMap<StoreKey, CacheEntry>,
    ttl: Duration,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ParameterStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`; an expired entry is evicted and reported absent.
    pub fn get(&self, key: &StoreKey) -> Option<ParameterSet> {
        match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                debug!("parameter cache hit for {}/{}", key.connection_id, key.endpoint);
                return Some(entry.params.clone());
            }
            Some(_) => {}
        }
        // Re-check under the write lock: a concurrent put may have refreshed it.
        self.entries
            .remove_if(key, |_, entry| entry.inserted_at.elapsed() >= self.ttl);
        debug!("parameter cache entry expired for {}/{}", key.connection_id, key.endpoint);
        None
    }

    pub fn put(&self, key: StoreKey, params: ParameterSet) {
        debug!("caching parameters for {}/{}", key.connection_id, key.endpoint);
        self.entries.insert(
            key,
            CacheEntry {
                params,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn evict(&self, key: &StoreKey) -> Option<ParameterSet> {
        self.entries.remove(key).map(|(_, entry)| entry.params)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
