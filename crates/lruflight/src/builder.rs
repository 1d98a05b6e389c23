// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`LruCache`].

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;
use tick::runtime::InactiveClock;

use crate::cache::CacheName;
use crate::{CacheConfig, LruCache, Resolve, Result};

const DEFAULT_NAME: CacheName = "lruflight";

/// Builder for an [`LruCache`].
///
/// Created by [`LruCache::builder`]. Options are validated once, in
/// [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use lruflight::LruCache;
///
/// let cache = LruCache::<String, i32>::builder()
///     .name("sessions")
///     .max_entries(1_000)
///     .ttl(Duration::from_secs(60))
///     .build()?;
///
/// assert_eq!(cache.name(), "sessions");
/// # Ok::<(), lruflight::Error>(())
/// ```
pub struct CacheBuilder<K, V> {
    name: CacheName,
    config: CacheConfig,
    resolver: Option<Arc<dyn Resolve<K, V>>>,
    clock: Option<Clock>,
}

impl<K, V> std::fmt::Debug for CacheBuilder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("resolver", &self.resolver.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<K, V> CacheBuilder<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_NAME,
            config: CacheConfig::default(),
            resolver: None,
            clock: None,
        }
    }

    /// Sets the name used to identify this cache in log events.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Replaces the size and expiry options.
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Bounds the cache to `max` entries; `0` leaves it unbounded.
    #[must_use]
    pub fn max_entries(mut self, max: u64) -> Self {
        self.config.max = max;
        self
    }

    /// Expires entries `ttl` after they are admitted or overwritten; zero disables expiry.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Sets the resolver used by [`LruCache::get`] for missing keys.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolve<K, V> + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Sets the clock used for expiry; defaults to the system clock.
    ///
    /// Tests can pass a clock from `tick::ClockControl` to move time forward
    /// deterministically.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Validates the options and creates the cache.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max` does not fit in `usize` or `ttl` is
    /// longer than the cache can represent.
    pub fn build(self) -> Result<LruCache<K, V>> {
        let policy = self.config.validate()?;
        Ok(LruCache::new(
            self.name,
            policy,
            self.clock.unwrap_or_else(system_clock),
            self.resolver,
        ))
    }
}

/// A clock reading the system's monotonic time.
///
/// Expiry only reads instants, so the timer driver is not needed.
fn system_clock() -> Clock {
    let (clock, _driver) = InactiveClock::default().activate();
    clock
}

