use std::collections::HashMap;

use crate::record::CachedDecision;

/// Display form of a cached read, `name:environment`. Used for logging
/// only; entries are keyed by the `(name, environment)` pair since both
/// parts may contain `:`.
pub fn cache_key(name: &str, environment: &str) -> String {
    format!("{}:{}", name, environment)
}

/// Unbounded map of evaluated decisions. Entries live until the next
/// [`invalidate_all`](DecisionCache::invalidate_all); there is no TTL and
/// no eviction.
///
/// The cache does no locking of its own. [`FlagService`](crate::FlagService)
/// wraps it in a mutex that also serializes store writes.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: HashMap<(String, String), CachedDecision>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

/// Point-in-time counters for a [`DecisionCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, name: &str, environment: &str) -> Option<CachedDecision> {
        let key = (name.to_string(), environment.to_string());
        match self.entries.get(&key) {
            Some(decision) => {
                self.hits += 1;
                Some(decision.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, name: &str, environment: &str, decision: CachedDecision) {
        self.entries
            .insert((name.to_string(), environment.to_string()), decision);
    }

    /// Drops every entry regardless of which flag changed.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.invalidations += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
        }
    }
}
