//! In-process caching of remote listings
//!
//! Directory listings and reference lists are cheap to keep and expensive in
//! API quota to fetch. [`TtlCache`] keeps each value for a fixed max-age;
//! staleness inside that window is accepted.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Cache key combining repository, reference and path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub repository: String,
    pub reference: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(repository: &str, reference: &str, path: &str) -> Self {
        Self {
            repository: repository.to_string(),
            reference: reference.to_string(),
            path: path.to_string(),
        }
    }
}

/// Thread-safe cache whose entries expire after `max_age`
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<Mutex<HashMap<K, (Instant, V)>>>,
    max_age: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create a new empty cache
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            max_age,
        }
    }

    /// Get a fresh cached value, or compute and cache it
    ///
    /// Errors from `processor` are returned and nothing is cached.
    pub fn get_or_process<F>(&self, key: K, processor: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(cached) = self.get(&key)? {
            log::debug!("cache hit for {:?}", key);
            return Ok(cached);
        }

        let value = processor()?;
        self.insert(key, value.clone())?;
        Ok(value)
    }

    /// Manually insert a value into the cache
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::lock_poisoned("cache"))?;
        entries.insert(key, (Instant::now(), value));
        Ok(())
    }

    /// Get a fresh value without computing. Expired entries are dropped.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::lock_poisoned("cache"))?;
        match entries.get(key) {
            Some((stored, value)) if stored.elapsed() <= self.max_age => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::lock_poisoned("cache"))?;
        entries.clear();
        Ok(())
    }

    /// Get the number of cached entries, expired ones included
    pub fn len(&self) -> Result<usize> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::lock_poisoned("cache"))?;
        Ok(entries.len())
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
