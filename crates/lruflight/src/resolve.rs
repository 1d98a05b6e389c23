// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolvers and the single-flight publication of their outcome.

use std::hash::Hash;

use futures_util::TryFutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::cache::CacheName;
use crate::entry::{Membership, Notifier, Outcome};
use crate::error::BoxError;
use crate::index::{NodeIndex, RecencyIndex};

/// Future returned by a [`Resolve`] implementation.
///
/// `Ok(None)` means the resolver determined there is nothing to cache for the key.
pub type ResolveFuture<V> = BoxFuture<'static, Result<Option<V>, BoxError>>;

/// Produces the value for a key that is missing from the cache.
///
/// The cache runs at most one resolution per key at a time. Callers that ask for
/// the same key while a resolution is running wait for it and receive the same
/// outcome. The resolver runs without any cache lock held, so it may take as long
/// as it needs; bounding that time is up to the resolver.
///
/// Any `Fn(K) -> impl Future<Output = Result<Option<V>, E>>` closure implements
/// this trait.
///
/// # Examples
///
/// ```
/// use lruflight::{BoxError, LruCache};
///
/// # futures::executor::block_on(async {
/// let cache = LruCache::<String, usize>::builder()
///     .resolver(|key: String| async move { Ok::<_, BoxError>(Some(key.len())) })
///     .build()?;
///
/// assert_eq!(cache.get(&"four".to_string()).await?, Some(4));
/// # Ok::<(), lruflight::Error>(())
/// # });
/// ```
pub trait Resolve<K, V>: Send + Sync {
    /// Starts resolving `key`.
    fn resolve(&self, key: K) -> ResolveFuture<V>;
}

impl<K, V, F, Fut, E> Resolve<K, V> for F
where
    F: Fn(K) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    V: 'static,
{
    fn resolve(&self, key: K) -> ResolveFuture<V> {
        Box::pin(self(key).map_err(Into::<BoxError>::into))
    }
}

/// A placeholder entry owned by the caller that discovered the key missing.
///
/// [`publish`](Self::publish) records the outcome in the index and then fires the
/// readiness signal. If the guard is dropped first, because the caller was
/// cancelled or the resolver panicked, the placeholder is removed and every waiter
/// is told the resolution was abandoned.
pub(crate) struct Resolution<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    index: &'a Mutex<RecencyIndex<K, V>>,
    idx: NodeIndex,
    membership: Membership,
    notifier: Option<Notifier<V>>,
    cache_name: CacheName,
}

impl<'a, K, V> Resolution<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(
        index: &'a Mutex<RecencyIndex<K, V>>,
        idx: NodeIndex,
        membership: Membership,
        notifier: Notifier<V>,
        cache_name: CacheName,
    ) -> Self {
        Self {
            index,
            idx,
            membership,
            notifier: Some(notifier),
            cache_name,
        }
    }

    /// Stores the outcome and wakes every waiter.
    ///
    /// A value is kept only if the placeholder is still indexed; the sentinel and
    /// errors remove it before readiness fires, so no later lookup can join a
    /// finished resolution.
    pub(crate) fn publish(mut self, outcome: Outcome<V>) -> Outcome<V> {
        let notifier = self.notifier.take().expect("a resolution is published at most once");

        {
            let mut index = self.index.lock();
            if self.membership.is_member() {
                match &outcome {
                    Ok(Some(value)) => index.node_mut(self.idx).entry.fulfill(value.clone()),
                    Ok(None) | Err(_) => {
                        index.remove(self.idx);
                    }
                }
            }
        }

        match &outcome {
            Ok(resolved) => tracing::trace!(
                cache.name = self.cache_name,
                cache.found = resolved.is_some(),
                cache.detached = !self.membership.is_member(),
                "cache.resolve.complete"
            ),
            Err(error) => tracing::debug!(cache.name = self.cache_name, error = %error, "cache.resolve.failed"),
        }

        notifier.notify(outcome.clone());
        outcome
    }
}

impl<K, V> Drop for Resolution<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        let Some(notifier) = self.notifier.take() else {
            return;
        };

        {
            let mut index = self.index.lock();
            if self.membership.is_member() {
                index.remove(self.idx);
            }
        }

        tracing::warn!(cache.name = self.cache_name, "cache.resolve.abandoned");

        // Dropping the notifier without firing it hands waiters an abandoned error.
        drop(notifier);
    }
}

impl<K, V> std::fmt::Debug for Resolution<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("idx", &self.idx)
            .field("published", &self.notifier.is_none())
            .finish_non_exhaustive()
    }
}
