use core::{fmt::Debug, hash::Hash, num::NonZeroUsize, time::Duration};
use std::{collections::HashSet, time::Instant};

use anyhow::{bail, Result};
use log::{debug, warn};
use lru::LruCache;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::Error;

struct Entries<K, V> {
    populated: LruCache<K, V>,
    in_progress: HashSet<K>,
}

/// Memoizes an expensive computation per key, running it at most once at a time.
///
/// A key is either absent, in progress or populated. The first caller to miss marks the key as
/// in progress and runs the computation outside the lock. Callers that find the key in progress
/// wait for it to be populated instead of repeating the computation. If the computation fails,
/// the marker is removed and waiting callers fail with [`Error::ComputationAbandoned`].
pub struct ComputationCache<K, V> {
    entries: Mutex<Entries<K, V>>,
    completed: Condvar,
    try_lock_timeout: Duration,
    wait_timeout: Duration,
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> ComputationCache<K, V> {
    #[must_use]
    pub fn new(capacity: NonZeroUsize, try_lock_timeout: Duration, wait_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(Entries {
                populated: LruCache::new(capacity),
                in_progress: HashSet::new(),
            }),
            completed: Condvar::new(),
            try_lock_timeout,
            wait_timeout,
        }
    }

    pub fn get_or_try_compute(&self, key: K, compute: impl FnOnce() -> Result<V>) -> Result<V> {
        let mut entries = self.try_lock()?;
        let deadline = Instant::now() + self.wait_timeout;
        let mut waited = false;

        loop {
            if let Some(value) = entries.populated.get(&key) {
                return Ok(value.clone());
            }

            if !entries.in_progress.contains(&key) {
                break;
            }

            waited = true;

            if self.completed.wait_until(&mut entries, deadline).timed_out()
                && entries.in_progress.contains(&key)
            {
                let error = Error::ComputationTimeout {
                    timeout: self.wait_timeout,
                };

                warn!("{error} (key: {key:?})");

                bail!(error);
            }
        }

        if waited {
            warn!("computation for {key:?} was abandoned by the caller running it");
            bail!(Error::ComputationAbandoned);
        }

        debug!("balance cache miss (key: {key:?})");

        entries.in_progress.insert(key.clone());

        drop(entries);

        let marker = InProgressMarker {
            cache: self,
            key: Some(key),
        };

        let value = compute()?;

        marker.complete(value.clone());

        Ok(value)
    }

    pub fn invalidate(&self, key: &K) -> Result<()> {
        self.try_lock()?.populated.pop(key);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.try_lock()?.populated.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.try_lock()?.populated.len())
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, Entries<K, V>>> {
        let timeout = self.try_lock_timeout;

        self.entries.try_lock_for(timeout).ok_or_else(|| {
            let error = Error::LockTimeout { timeout };

            warn!("{error:?}");

            error.into()
        })
    }
}

// Clears the in-progress marker even if the computation fails or panics.
struct InProgressMarker<'cache, K: Hash + Eq, V> {
    cache: &'cache ComputationCache<K, V>,
    key: Option<K>,
}

impl<K: Hash + Eq, V> InProgressMarker<'_, K, V> {
    fn complete(mut self, value: V) {
        if let Some(key) = self.key.take() {
            let mut entries = self.cache.entries.lock();
            entries.in_progress.remove(&key);
            entries.populated.put(key, value);
            drop(entries);

            self.cache.completed.notify_all();
        }
    }
}

impl<K: Hash + Eq, V> Drop for InProgressMarker<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.entries.lock().in_progress.remove(&key);
            self.cache.completed.notify_all();
        }
    }
}
