//! In-process read-through cache with single-flight recomputation.
//!
//! One cache instance is created at startup and shared by every worker.
//! When a key is missing or expired exactly one caller computes it; the
//! others wait (bounded by `wait_timeout`) or, if an expired value exists,
//! get that stale value straight away. Entries are a derived view of the
//! store and never the source of truth: writers that need their change seen
//! immediately call [`ReadThroughCache::invalidate`].

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// How a cached read was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Fresh entry already in the cache
    Hit,
    /// Expired entry served while another caller recomputes
    Stale,
    /// Computed by this caller
    Computed,
}

/// A value read through the cache, with metadata.
#[derive(Debug, Clone)]
pub struct CachedValue<V> {
    /// The cached payload
    pub value: V,
    /// When the payload was computed
    pub cached_at: Instant,
    /// When the payload expires
    pub expires_at: Instant,
    pub source: CacheSource,
}

impl<V> CachedValue<V> {
    /// Whether the payload had expired when it was served.
    pub fn is_stale(&self) -> bool {
        self.source == CacheSource::Stale
    }

    /// Get the age of the cached payload.
    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cached entries
    pub total_entries: usize,
    /// Number of valid (non-expired) entries
    pub valid_entries: usize,
    /// Number of expired entries
    pub expired_entries: usize,
    /// Keys currently being computed
    pub in_flight: usize,
}

struct Stored<V> {
    value: V,
    cached_at: Instant,
    expires_at: Instant,
}

struct Slot<V> {
    stored: Option<Stored<V>>,
    computing: bool,
    /// Bumped by every invalidation; a computation that started under an
    /// older generation must not publish its result.
    generation: u64,
}

/// Shared read-through cache keyed by string.
pub struct ReadThroughCache<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
    settled: Condvar,
    wait_timeout: Duration,
}

impl<V: Clone> ReadThroughCache<V> {
    /// Create an empty cache. Waiters give up after `wait_timeout`.
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            settled: Condvar::new(),
            wait_timeout,
        }
    }

    /// Return the cached value for `key`, computing it with `compute` on a
    /// miss. Compute errors are returned to the computing caller and nothing
    /// is cached.
    pub fn get_or_compute<E, F>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<CachedValue<V>, CacheError<E>>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let deadline = Instant::now() + self.wait_timeout;
        let mut slots = self.lock();

        let generation = loop {
            let now = Instant::now();
            let slot = slots.entry(key.to_string()).or_insert_with(Slot::empty);

            if let Some(stored) = &slot.stored {
                if stored.expires_at > now {
                    tracing::debug!("cache hit for {}", key);
                    return Ok(stored.to_cached(CacheSource::Hit));
                }
                if slot.computing {
                    tracing::debug!("serving stale {} during refresh", key);
                    return Ok(stored.to_cached(CacheSource::Stale));
                }
            }

            if !slot.computing {
                slot.computing = true;
                break slot.generation;
            }

            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                return Err(CacheError::WaitTimeout(key.to_string()));
            }

            slots = match self.settled.wait_timeout(slots, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        };
        drop(slots);

        tracing::debug!("cache miss for {}, computing", key);
        let mut flight = Flight {
            cache: self,
            key,
            generation,
            completed: false,
        };

        let value = compute().map_err(CacheError::Compute)?;
        let cached = flight.publish(value, ttl);
        Ok(cached)
    }

    /// Drop the entry for `key`. Reads that start afterwards recompute.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut slots = self.lock();
        match slots.get_mut(key) {
            Some(slot) => {
                slot.generation += 1;
                let removed = slot.stored.take().is_some();
                if !slot.computing {
                    slots.remove(key);
                }
                removed
            }
            None => false,
        }
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many
    /// stored values were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut slots = self.lock();
        let mut removed = 0;

        for slot in slots
            .iter_mut()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, slot)| slot)
        {
            slot.generation += 1;
            if slot.stored.take().is_some() {
                removed += 1;
            }
        }
        slots.retain(|_, slot| slot.computing || slot.stored.is_some());

        removed
    }

    /// Remove expired entries that nobody is recomputing.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.lock();
        let before = slots.len();

        slots.retain(|_, slot| {
            slot.computing || slot.stored.as_ref().is_some_and(|s| s.expires_at > now)
        });

        let removed = before - slots.len();
        if removed > 0 {
            tracing::info!("Cleaned up {} expired cache entries", removed);
        }
        removed
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let slots = self.lock();
        let mut stats = CacheStats::default();

        for slot in slots.values() {
            if slot.computing {
                stats.in_flight += 1;
            }
            if let Some(stored) = &slot.stored {
                stats.total_entries += 1;
                if stored.expires_at > now {
                    stats.valid_entries += 1;
                } else {
                    stats.expired_entries += 1;
                }
            }
        }

        stats
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        // Slots are only mutated in short critical sections that cannot
        // leave them inconsistent, so a poisoned lock is still usable.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V> Slot<V> {
    fn empty() -> Self {
        Self {
            stored: None,
            computing: false,
            generation: 0,
        }
    }
}

impl<V: Clone> Stored<V> {
    fn to_cached(&self, source: CacheSource) -> CachedValue<V> {
        CachedValue {
            value: self.value.clone(),
            cached_at: self.cached_at,
            expires_at: self.expires_at,
            source,
        }
    }
}

/// An in-progress computation. Clears the slot's `computing` flag and wakes
/// waiters on every exit path, including compute errors and panics.
struct Flight<'a, V: Clone> {
    cache: &'a ReadThroughCache<V>,
    key: &'a str,
    generation: u64,
    completed: bool,
}

impl<V: Clone> Flight<'_, V> {
    fn publish(&mut self, value: V, ttl: Duration) -> CachedValue<V> {
        let now = Instant::now();
        let stored = Stored {
            value,
            cached_at: now,
            expires_at: now + ttl,
        };
        let cached = stored.to_cached(CacheSource::Computed);

        let mut slots = self.cache.lock();
        let slot = slots.entry(self.key.to_string()).or_insert_with(Slot::empty);
        slot.computing = false;
        if slot.generation == self.generation {
            slot.stored = Some(stored);
        } else {
            tracing::debug!("discarding {} computed before invalidation", self.key);
            if slot.stored.is_none() {
                slots.remove(self.key);
            }
        }
        drop(slots);

        self.completed = true;
        self.cache.settled.notify_all();
        cached
    }
}

impl<V: Clone> Drop for Flight<'_, V> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        let mut slots = self.cache.lock();
        if let Some(slot) = slots.get_mut(self.key) {
            slot.computing = false;
            if slot.stored.is_none() {
                slots.remove(self.key);
            }
        }
        drop(slots);
        self.cache.settled.notify_all();
    }
}

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError<E> {
    #[error("Timed out waiting for {0} to be computed")]
    WaitTimeout(String),

    #[error("Cache compute failed: {0}")]
    Compute(E),
}
