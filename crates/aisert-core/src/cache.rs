//! Keyed cache for expensive backing resources (tokenizers, embedding models).
//!
//! One instance per key, shared by every chain controller that holds the
//! cache. Creation is serialized per key: concurrent first access to one key
//! creates at most one instance, while other keys stay readable and
//! creatable. A failed factory call caches nothing; the next caller retries
//! construction.
//!
//! Lock order is always key lock, then entries.
//!
//! Entries live until removed explicitly or trimmed with
//! [`ModelInstanceCache::shrink_to`]. Eviction is in insertion order, not
//! recency.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

struct Entries<T: ?Sized> {
    instances: HashMap<String, Arc<T>>,
    order: VecDeque<String>,
    /// Creation locks for keys being built or whose last build failed.
    creating: HashMap<String, Arc<Mutex<()>>>,
}

/// Lock-guarded singleton-per-key cache.
pub struct ModelInstanceCache<T: ?Sized> {
    entries: Mutex<Entries<T>>,
}

impl<T: ?Sized> ModelInstanceCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                instances: HashMap::new(),
                order: VecDeque::new(),
                creating: HashMap::new(),
            }),
        }
    }

    /// Return the instance for `key`, creating it with `factory` if absent.
    ///
    /// The factory runs under a lock for `key` alone, so a slow load never
    /// blocks lookups or loads of other keys. Its error is returned unchanged
    /// and nothing is stored.
    pub fn get_or_create<F, E>(&self, key: &str, factory: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        let key_lock = {
            let mut entries = self.entries.lock();
            if let Some(instance) = entries.instances.get(key) {
                tracing::trace!(key = %key, "model cache hit");
                return Ok(Arc::clone(instance));
            }
            Arc::clone(entries.creating.entry(key.to_string()).or_default())
        };

        let _creating = key_lock.lock();
        if let Some(instance) = self.get(key) {
            tracing::trace!(key = %key, "model created by another caller");
            return Ok(instance);
        }

        tracing::info!(key = %key, "creating model instance");
        let instance = factory()?;

        let mut entries = self.entries.lock();
        entries
            .instances
            .insert(key.to_string(), Arc::clone(&instance));
        entries.order.push_back(key.to_string());
        entries.creating.remove(key);
        Ok(instance)
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.lock().instances.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().instances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().order.iter().cloned().collect()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.lock();
        let removed = entries.instances.remove(key)?;
        entries.order.retain(|k| k != key);
        Some(removed)
    }

    /// Evict oldest-inserted entries until at most `max_entries` remain.
    ///
    /// Returns the number of evicted entries. Callers still holding an
    /// evicted `Arc` keep it alive.
    pub fn shrink_to(&self, max_entries: usize) -> usize {
        let mut entries = self.entries.lock();
        let mut evicted = 0;
        while entries.instances.len() > max_entries {
            let Some(key) = entries.order.pop_front() else {
                break;
            };
            if entries.instances.remove(&key).is_some() {
                tracing::debug!(key = %key, "evicted model instance");
                evicted += 1;
            }
        }
        evicted
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.instances.clear();
        entries.order.clear();
    }

    #[cfg(test)]
    fn pending_creations(&self) -> usize {
        self.entries.lock().creating.len()
    }
}

impl<T: ?Sized> Default for ModelInstanceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for ModelInstanceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstanceCache")
            .field("keys", &self.keys())
            .finish()
    }
}
