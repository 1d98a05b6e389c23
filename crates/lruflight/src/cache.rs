// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache facade.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tick::Clock;

use crate::builder::CacheBuilder;
use crate::entry::{self, Entry, EntryState, Membership, Notifier, Readiness};
use crate::eviction::{Evicted, EvictionPolicy};
use crate::index::{NodeIndex, RecencyIndex};
use crate::resolve::{Resolution, Resolve};
use crate::Result;

/// Name identifying a cache in log events.
pub type CacheName = &'static str;

/// A bounded, time-expiring LRU cache with single-flight population.
///
/// Entries are kept in recency order. When the cache is bounded, admitting a new
/// entry evicts the least recently used one; when a TTL is configured, entries
/// become stale `ttl` after they were admitted or last overwritten and are dropped
/// lazily.
///
/// On a miss, [`get`](Self::get) runs the configured [`Resolve`] implementation.
/// Concurrent callers for the same key share one resolution: only the caller that
/// found the key missing runs the resolver and everyone else waits for its outcome.
/// Failed resolutions and the "not found" outcome are never cached, so the next
/// lookup starts a fresh attempt.
///
/// The structural bookkeeping happens under a short critical section; resolvers run
/// outside it, so a slow resolution for one key never blocks other keys.
///
/// # Examples
///
/// ```
/// use lruflight::LruCache;
///
/// # futures::executor::block_on(async {
/// let cache = LruCache::<&str, i32>::builder().max_entries(2).build()?;
///
/// cache.set("a", 1).set("b", 2).set("c", 3);
///
/// assert_eq!(cache.get(&"a").await?, None);
/// assert_eq!(cache.get(&"b").await?, Some(2));
/// assert_eq!(cache.keys(), ["c", "b"]);
/// # Ok::<(), lruflight::Error>(())
/// # });
/// ```
pub struct LruCache<K, V> {
    name: CacheName,
    index: Mutex<RecencyIndex<K, V>>,
    policy: EvictionPolicy,
    clock: Clock,
    resolver: Option<Arc<dyn Resolve<K, V>>>,
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("resolver", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

/// What a lookup does once the lock is released.
enum Lookup<'r, V, R: ?Sized> {
    Done(Option<V>),
    Wait {
        idx: NodeIndex,
        readiness: Readiness<V>,
        membership: Membership,
    },
    Resolve {
        resolver: &'r R,
        idx: NodeIndex,
        membership: Membership,
        notifier: Notifier<V>,
    },
}

/// Result of touching an indexed entry.
enum Visit<V> {
    Value(V),
    Expired,
    Pending(Readiness<V>, Membership),
}

impl<K, V> LruCache<K, V> {
    /// Creates a builder for a cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use lruflight::LruCache;
    ///
    /// let cache = LruCache::<String, String>::builder().max_entries(100).build()?;
    /// assert!(cache.is_empty());
    /// # Ok::<(), lruflight::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(name: CacheName, policy: EvictionPolicy, clock: Clock, resolver: Option<Arc<dyn Resolve<K, V>>>) -> Self {
        Self {
            name,
            index: Mutex::new(RecencyIndex::default()),
            policy,
            clock,
            resolver,
        }
    }

    /// Returns the value for `key`, resolving it with the default resolver on a miss.
    ///
    /// If a resolution for `key` is already running, this waits for it and returns
    /// its outcome. Without a default resolver a miss returns `Ok(None)` immediately.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error if the resolution this call joined failed, or an
    /// abandoned error if that resolution was dropped before finishing.
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        self.lookup(key, self.resolver.as_deref()).await
    }

    /// Like [`get`](Self::get), but resolves a miss with `resolver` instead of the
    /// default one.
    ///
    /// The override only matters if this call is the one that finds the key
    /// missing. A call that arrives while another resolution for `key` is running
    /// joins it, whichever resolver that resolution uses.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn get_with<R>(&self, key: &K, resolver: &R) -> Result<Option<V>>
    where
        R: Resolve<K, V> + ?Sized,
    {
        self.lookup(key, Some(resolver)).await
    }

    async fn lookup<R>(&self, key: &K, resolver: Option<&R>) -> Result<Option<V>>
    where
        R: Resolve<K, V> + ?Sized,
    {
        let step = {
            let mut index = self.index.lock();
            let now = self.clock.instant();

            match index.find(key) {
                Some(idx) => match Self::visit(&mut index, idx, now) {
                    Visit::Value(value) => Lookup::Done(Some(value)),
                    Visit::Expired => Lookup::Done(None),
                    Visit::Pending(readiness, membership) => Lookup::Wait {
                        idx,
                        readiness,
                        membership,
                    },
                },
                None => match resolver {
                    Some(resolver) => {
                        let (idx, membership, notifier) = self.admit_pending(&mut index, key.clone(), now);
                        Lookup::Resolve {
                            resolver,
                            idx,
                            membership,
                            notifier,
                        }
                    }
                    None => Lookup::Done(None),
                },
            }
        };

        match step {
            Lookup::Done(value) => Ok(value),
            Lookup::Wait {
                idx,
                readiness,
                membership,
            } => self.wait_for(idx, readiness, membership).await,
            Lookup::Resolve {
                resolver,
                idx,
                membership,
                notifier,
            } => {
                let resolution = Resolution::new(&self.index, idx, membership, notifier, self.name);
                tracing::trace!(cache.name = self.name, "cache.resolve.start");
                let outcome = resolver.resolve(key.clone()).await.map_err(crate::Error::resolve);
                resolution.publish(outcome)
            }
        }
    }

    /// Reads an indexed entry: drops it if stale, otherwise records the access.
    fn visit(index: &mut RecencyIndex<K, V>, idx: NodeIndex, now: Instant) -> Visit<V> {
        let entry = &index.node(idx).entry;
        let value = match entry.state() {
            EntryState::Pending(readiness) => return Visit::Pending(readiness.clone(), entry.membership().clone()),
            EntryState::Ready(value) => value,
        };

        if entry.is_expired(now) {
            index.remove(idx);
            return Visit::Expired;
        }

        let value = value.clone();
        index.move_to_back(idx);
        Visit::Value(value)
    }

    /// Waits for a resolution started by another caller.
    async fn wait_for(&self, idx: NodeIndex, readiness: Readiness<V>, membership: Membership) -> Result<Option<V>> {
        let Some(resolved) = readiness.wait().await? else {
            return Ok(None);
        };

        let mut index = self.index.lock();

        // Removed while we were suspended: hand out the last good value without
        // putting the entry back.
        if !membership.is_member() {
            return Ok(Some(resolved));
        }

        match Self::visit(&mut index, idx, self.clock.instant()) {
            Visit::Value(value) => Ok(Some(value)),
            Visit::Expired => Ok(None),
            // A member entry is fulfilled before its readiness fires.
            Visit::Pending(..) => Ok(Some(resolved)),
        }
    }

    fn admit_pending(&self, index: &mut RecencyIndex<K, V>, key: K, now: Instant) -> (NodeIndex, Membership, Notifier<V>) {
        let evicted = self.policy.evict(index, now);
        self.record_eviction(evicted);

        let (notifier, readiness) = entry::readiness();
        let idx = index.push_back(key, Entry::pending(readiness, self.policy.expiry_from(now)));
        let membership = index.node(idx).entry.membership().clone();
        (idx, membership, notifier)
    }

    /// Stores `value` under `key` without running a resolver.
    ///
    /// An existing value is replaced, its expiry refreshed and it becomes the most
    /// recently used entry. If a resolution for `key` is still running it keeps
    /// running for the callers already waiting on it, but its result no longer
    /// lands in the cache.
    pub fn set(&self, key: K, value: V) -> &Self {
        let evicted = {
            let mut index = self.index.lock();
            let now = self.clock.instant();
            let expiry = self.policy.expiry_from(now);

            if let Some(idx) = index.find(&key) {
                let entry = &mut index.node_mut(idx).entry;
                if matches!(entry.state(), EntryState::Ready(_)) {
                    entry.overwrite(value, expiry);
                    index.move_to_back(idx);
                    return self;
                }
                index.remove(idx);
            }

            let evicted = self.policy.evict(&mut index, now);
            index.push_back(key, Entry::ready(value, expiry));
            evicted
        };

        self.record_eviction(evicted);
        self
    }

    /// Removes `key` from the cache.
    ///
    /// Callers already waiting on a resolution for `key` still receive its outcome.
    pub fn delete(&self, key: &K) -> &Self {
        let mut index = self.index.lock();
        if let Some(idx) = index.find(key) {
            index.remove(idx);
        }
        self
    }

    /// Returns `true` if `key` is present and not stale.
    ///
    /// A stale entry is removed as a side effect. A key that is still being
    /// resolved counts as present.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        let mut index = self.index.lock();
        let Some(idx) = index.find(key) else {
            return false;
        };

        if index.node(idx).entry.is_expired(self.clock.instant()) {
            index.remove(idx);
            return false;
        }
        true
    }

    /// Removes every entry.
    ///
    /// Callers already waiting on a resolution still receive its outcome.
    pub fn clear(&self) -> &Self {
        self.index.lock().clear();
        self
    }

    /// Runs the same eviction pass that precedes every insertion.
    ///
    /// A bounded cache that is full drops its least recently used entry, then stale
    /// entries are swept from the least recently used end. Insertions already evict
    /// as they go; this is meant for periodic maintenance.
    pub fn evict(&self) -> &Self {
        let evicted = {
            let mut index = self.index.lock();
            self.policy.evict(&mut index, self.clock.instant())
        };
        self.record_eviction(evicted);
        self
    }

    /// Returns the keys from least to most recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.index.lock().iter().map(|node| node.key.clone()).collect()
    }

    /// Looks up every key returned by [`keys`](Self::keys) through [`get`](Self::get).
    ///
    /// Reading reorders entries and may drop stale ones.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by [`get`](Self::get).
    pub async fn values(&self) -> Result<Vec<Option<V>>> {
        self.values_of(self.keys()).await
    }

    /// Looks up each of `keys` through [`get`](Self::get), in order.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by [`get`](Self::get).
    pub async fn values_of(&self, keys: impl IntoIterator<Item = K>) -> Result<Vec<Option<V>>> {
        let mut values = Vec::new();
        for key in keys {
            values.push(self.get(&key).await?);
        }
        Ok(values)
    }

    /// Pairs every key returned by [`keys`](Self::keys) with its value from
    /// [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// Returns the first error produced by [`get`](Self::get).
    pub async fn entries(&self) -> Result<Vec<(K, Option<V>)>> {
        self.entries_of(self.keys()).await
    }

    /// Pairs each of `keys` with its value from [`get`](Self::get), in order.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by [`get`](Self::get).
    pub async fn entries_of(&self, keys: impl IntoIterator<Item = K>) -> Result<Vec<(K, Option<V>)>> {
        let mut entries = Vec::new();
        for key in keys {
            let value = self.get(&key).await?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Returns the number of entries, including ones still being resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the name of this cache.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.name
    }

    /// Returns the maximum number of entries, or `None` if unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.policy.capacity()
    }

    /// Returns the time-to-live, or `None` if entries never expire.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.policy.ttl()
    }

    /// Returns the clock used for expiry.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn record_eviction(&self, evicted: Evicted) {
        if evicted.total() == 0 {
            return;
        }
        if evicted.capacity > 0 {
            tracing::debug!(
                cache.name = self.name,
                cache.evicted = evicted.capacity,
                cache.reason = "capacity",
                "cache.evict"
            );
        }
        if evicted.expired > 0 {
            tracing::debug!(
                cache.name = self.name,
                cache.evicted = evicted.expired,
                cache.reason = "expired",
                "cache.evict"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.index.lock().check_invariants();
    }
}
