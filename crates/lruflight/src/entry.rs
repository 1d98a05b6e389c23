// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache entries and the readiness signal shared between an entry's waiters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures_channel::oneshot;
use futures_util::FutureExt;
use futures_util::future::Shared;

use crate::Error;

/// Terminal result of a resolution: a value, the "not found" sentinel, or an error.
pub(crate) type Outcome<V> = Result<Option<V>, Error>;

/// A single cache record.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    state: EntryState<V>,
    expiry: Option<Instant>,
    membership: Membership,
}

#[derive(Debug)]
pub(crate) enum EntryState<V> {
    /// A resolver is running; callers wait on the readiness signal.
    Pending(Readiness<V>),
    /// The value is final and can be read without waiting.
    Ready(V),
}

impl<V> Entry<V> {
    pub(crate) fn pending(readiness: Readiness<V>, expiry: Option<Instant>) -> Self {
        Self {
            state: EntryState::Pending(readiness),
            expiry,
            membership: Membership::new(),
        }
    }

    pub(crate) fn ready(value: V, expiry: Option<Instant>) -> Self {
        Self {
            state: EntryState::Ready(value),
            expiry,
            membership: Membership::new(),
        }
    }

    pub(crate) const fn state(&self) -> &EntryState<V> {
        &self.state
    }

    pub(crate) const fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Returns `true` if the entry's expiry is at or before `now`.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// Stores the final value of a pending entry. Expiry is left as set at creation.
    pub(crate) fn fulfill(&mut self, value: V) {
        self.state = EntryState::Ready(value);
    }

    /// Replaces the value and refreshes the expiry.
    pub(crate) fn overwrite(&mut self, value: V, expiry: Option<Instant>) {
        self.state = EntryState::Ready(value);
        self.expiry = expiry;
    }

    #[cfg(test)]
    pub(crate) const fn expiry(&self) -> Option<Instant> {
        self.expiry
    }
}

/// Tracks whether an entry is still linked into its cache.
///
/// Waiters keep a clone so that, after being woken, they can tell whether the
/// entry they waited on was removed while they were suspended. The flag is only
/// written while the cache lock is held.
#[derive(Debug, Clone)]
pub(crate) struct Membership(Arc<AtomicBool>);

impl Membership {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn is_member(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Creates a one-shot, broadcast readiness signal.
///
/// The [`Notifier`] is owned by the caller running the resolver; every waiter holds
/// a clone of the [`Readiness`] half and observes the same outcome.
pub(crate) fn readiness<V: Clone>() -> (Notifier<V>, Readiness<V>) {
    let (sender, receiver) = oneshot::channel();
    (Notifier { sender }, Readiness { signal: receiver.shared() })
}

pub(crate) struct Notifier<V> {
    sender: oneshot::Sender<Outcome<V>>,
}

impl<V> std::fmt::Debug for Notifier<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl<V> Notifier<V> {
    /// Fires the signal. Consuming `self` guarantees it fires at most once.
    pub(crate) fn notify(self, outcome: Outcome<V>) {
        // Nobody listening is fine: all waiters may have been dropped.
        drop(self.sender.send(outcome));
    }
}

pub(crate) struct Readiness<V> {
    signal: Shared<oneshot::Receiver<Outcome<V>>>,
}

impl<V> std::fmt::Debug for Readiness<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness").finish_non_exhaustive()
    }
}

impl<V> Clone for Readiness<V> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<V: Clone> Readiness<V> {
    /// Waits until the outcome is published.
    ///
    /// If the notifier is dropped without firing, every waiter receives an
    /// abandoned error.
    pub(crate) async fn wait(self) -> Outcome<V> {
        self.signal.await.unwrap_or_else(|oneshot::Canceled| Err(Error::abandoned()))
    }
}
