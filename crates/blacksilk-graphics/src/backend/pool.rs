//! Bounded object pool guarded by [`Resource`].
//!
//! Acquisition tries up to `attempts` free candidates with a matching key and
//! otherwise creates a new object. It never blocks; an exhausted pool simply
//! hands out an unpooled object once `capacity` is reached.

use std::ops::Deref;
use std::sync::{Arc, Mutex};

#[allow(unused_imports)]
use tracing::{debug, trace};

use super::resource::Resource;

/// Pool entry: key, guard word, payload.
#[derive(Debug)]
pub struct Pooled<K, T> {
    key: K,
    resource: Resource,
    value: T,
}

impl<K, T> Pooled<K, T> {
    /// Lookup key.
    pub fn key(&self) -> &K {
        &self.key
    }
}

/// Exclusive handle on a pooled object; releases on drop.
#[derive(Debug)]
pub struct PoolGuard<K, T> {
    entry: Arc<Pooled<K, T>>,
}

impl<K, T> Deref for PoolGuard<K, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entry.value
    }
}

impl<K, T> Drop for PoolGuard<K, T> {
    fn drop(&mut self) {
        // guards may move between threads with their image object
        if !self.entry.resource.release() {
            self.entry.resource.force_release();
        }
    }
}

/// Keyed pool of reusable objects.
#[derive(Debug)]
pub struct Pool<K, T> {
    entries: Mutex<Vec<Arc<Pooled<K, T>>>>,
    capacity: usize,
    attempts: usize,
}

impl<K: PartialEq + Clone, T> Pool<K, T> {
    /// Empty pool keeping at most `capacity` objects.
    pub fn new(capacity: usize, attempts: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity,
            attempts: attempts.max(1),
        }
    }

    /// Reuses a free object with `key` or creates one with `create`.
    ///
    /// Returns `None` only if `create` fails or the pool lock is poisoned.
    pub fn acquire(&self, key: K, create: impl FnOnce() -> Option<T>) -> Option<PoolGuard<K, T>> {
        let mut entries = self.entries.lock().ok()?;

        let reused = entries
            .iter()
            .filter(|e| e.key == key)
            .take(self.attempts)
            .find(|e| e.resource.try_acquire())
            .cloned();
        if let Some(entry) = reused {
            trace!("pool hit");
            return Some(PoolGuard { entry });
        }

        let entry = Arc::new(Pooled {
            key,
            resource: Resource::new(),
            value: create()?,
        });
        entry.resource.acquire();

        if entries.len() < self.capacity {
            entries.push(entry.clone());
        } else if let Some(slot) = entries.iter_mut().find(|e| !e.resource.is_acquired()) {
            debug!("pool full, evicting idle entry");
            *slot = entry.clone();
        }
        Some(PoolGuard { entry })
    }

    /// Number of pooled objects.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// True if nothing is pooled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every idle object.
    pub fn trim(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|e| e.resource.is_acquired());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_after_release() {
        let pool: Pool<usize, Vec<u8>> = Pool::new(4, 2);
        let first = pool.acquire(16, || Some(vec![0; 16])).unwrap();
        let ptr = first.as_ptr();
        let second = pool.acquire(16, || Some(vec![0; 16])).unwrap();
        assert_ne!(second.as_ptr(), ptr);
        drop(first);
        let third = pool.acquire(16, || Some(vec![1; 16])).unwrap();
        assert_eq!(third.as_ptr(), ptr);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let pool: Pool<usize, u32> = Pool::new(1, 1);
        let a = pool.acquire(1, || Some(1)).unwrap();
        let b = pool.acquire(1, || Some(2)).unwrap();
        assert_eq!((*a, *b), (1, 2));
        assert_eq!(pool.len(), 1);
        drop((a, b));
        pool.trim();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_failed_create() {
        let pool: Pool<usize, u32> = Pool::new(1, 1);
        assert!(pool.acquire(1, || None).is_none());
    }
}
