// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Size-bound and TTL eviction.
//!
//! Eviction only removes nodes from the index; it never touches an entry's
//! readiness. Anyone still waiting on a removed entry receives its outcome as usual.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::index::RecencyIndex;

/// Number of entries removed by one eviction pass, split by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Evicted {
    pub(crate) capacity: usize,
    pub(crate) expired: usize,
}

impl Evicted {
    pub(crate) const fn total(self) -> usize {
        self.capacity + self.expired
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EvictionPolicy {
    capacity: Option<NonZeroUsize>,
    ttl: Option<Duration>,
}

impl EvictionPolicy {
    pub(crate) const fn new(capacity: Option<NonZeroUsize>, ttl: Option<Duration>) -> Self {
        Self { capacity, ttl }
    }

    pub(crate) const fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    pub(crate) const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Expiry for an entry admitted or refreshed at `now`.
    pub(crate) fn expiry_from(&self, now: Instant) -> Option<Instant> {
        // The TTL is capped at build time, so the addition stays in range.
        self.ttl.map(|ttl| now + ttl)
    }

    /// Frees a slot for one new entry, then sweeps expired entries from the head.
    ///
    /// Runs before every admission and as the public maintenance pass, so a full
    /// cache always drops its least recently used entry.
    pub(crate) fn evict<K, V>(&self, index: &mut RecencyIndex<K, V>, now: Instant) -> Evicted
    where
        K: Eq + Hash + Clone,
    {
        let capacity = self.trim(index);
        let expired = self.sweep_expired(index, now);
        Evicted { capacity, expired }
    }

    fn trim<K, V>(&self, index: &mut RecencyIndex<K, V>) -> usize
    where
        K: Eq + Hash + Clone,
    {
        let Some(capacity) = self.capacity else {
            return 0;
        };

        let mut removed = 0;
        while index.len() >= capacity.get() && index.pop_front().is_some() {
            removed += 1;
        }
        removed
    }

    /// Removes expired entries from the head, stopping at the first fresh one.
    ///
    /// Expiry grows from head to tail for entries admitted or refreshed in order, so
    /// the first fresh entry bounds the sweep. Entries that are stale further along
    /// are dropped lazily when looked up.
    pub(crate) fn sweep_expired<K, V>(&self, index: &mut RecencyIndex<K, V>, now: Instant) -> usize
    where
        K: Eq + Hash + Clone,
    {
        if self.ttl.is_none() {
            return 0;
        }

        let mut removed = 0;
        while let Some(head) = index.front() {
            if !index.node(head).entry.is_expired(now) {
                break;
            }
            index.remove(head);
            removed += 1;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    fn keys(index: &RecencyIndex<u32, u32>) -> Vec<u32> {
        index.iter().map(|node| node.key).collect()
    }

    #[test]
    fn evict_leaves_space_for_one() {
        let policy = EvictionPolicy::new(NonZeroUsize::new(3), None);
        let mut index = RecencyIndex::default();
        for key in 0..3 {
            index.push_back(key, Entry::ready(key, None));
        }

        let evicted = policy.evict(&mut index, Instant::now());

        assert_eq!(evicted, Evicted { capacity: 1, expired: 0 });
        assert_eq!(keys(&index), [1, 2]);
        index.check_invariants();
    }

    #[test]
    fn unbounded_never_trims() {
        let policy = EvictionPolicy::new(None, None);
        let mut index = RecencyIndex::default();
        for key in 0..100 {
            index.push_back(key, Entry::ready(key, None));
        }

        assert_eq!(policy.evict(&mut index, Instant::now()).total(), 0);
        assert_eq!(index.len(), 100);
    }

    #[test]
    fn sweep_stops_at_first_fresh_entry() {
        let ttl = Duration::from_secs(10);
        let policy = EvictionPolicy::new(None, Some(ttl));
        let start = Instant::now();
        let mut index = RecencyIndex::default();
        index.push_back(1, Entry::ready(1, policy.expiry_from(start)));
        index.push_back(2, Entry::ready(2, policy.expiry_from(start + Duration::from_secs(5))));
        index.push_back(3, Entry::ready(3, policy.expiry_from(start)));

        // Entry 3 is stale but sits behind a fresh entry.
        let removed = policy.sweep_expired(&mut index, start + ttl);

        assert_eq!(removed, 1);
        assert_eq!(keys(&index), [2, 3]);
        index.check_invariants();
    }

    #[test]
    fn sweep_without_ttl_is_noop() {
        let policy = EvictionPolicy::new(None, None);
        let mut index = RecencyIndex::default();
        index.push_back(1, Entry::ready(1, None));

        assert_eq!(policy.sweep_expired(&mut index, Instant::now()), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn evict_on_full_index_drops_head() {
        let policy = EvictionPolicy::new(NonZeroUsize::new(2), None);
        let mut index = RecencyIndex::default();
        index.push_back(1, Entry::ready(1, None));
        index.push_back(2, Entry::ready(2, None));

        assert_eq!(policy.evict(&mut index, Instant::now()), Evicted { capacity: 1, expired: 0 });
        assert_eq!(keys(&index), [2]);
        index.check_invariants();
    }

    #[test]
    fn evict_trims_before_sweeping() {
        let ttl = Duration::from_secs(10);
        let policy = EvictionPolicy::new(NonZeroUsize::new(2), Some(ttl));
        let start = Instant::now();
        let mut index = RecencyIndex::default();
        index.push_back(1, Entry::ready(1, policy.expiry_from(start)));
        index.push_back(2, Entry::ready(2, policy.expiry_from(start)));

        let evicted = policy.evict(&mut index, start + ttl);

        assert_eq!(evicted, Evicted { capacity: 1, expired: 1 });
        assert_eq!(index.len(), 0);
        index.check_invariants();
    }

    #[test]
    fn expiry_from_applies_ttl() {
        let now = Instant::now();

        assert_eq!(EvictionPolicy::new(None, None).expiry_from(now), None);
        assert_eq!(
            EvictionPolicy::new(None, Some(Duration::from_millis(100))).expiry_from(now),
            Some(now + Duration::from_millis(100))
        );
    }
}
