// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A bounded, time-expiring LRU cache with single-flight population.
//!
//! This crate provides [`LruCache`], an in-process lookup layer that avoids redundant
//! expensive recomputation when many concurrent callers ask for the same missing key.
//! It combines:
//!
//! 1. **Strict recency eviction:** Entries are threaded through an arena-backed
//!    doubly-linked list, oldest-used first. A bounded cache evicts from the head.
//! 2. **TTL expiry:** Entries become stale a fixed time after they were admitted or
//!    overwritten. Stale entries are swept from the head lazily, or on demand with
//!    [`LruCache::evict`].
//! 3. **Single-flight resolution:** On a miss the first caller runs the [`Resolve`]
//!    implementation; every concurrent caller for that key waits for the same
//!    outcome instead of starting its own.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use lruflight::{BoxError, LruCache};
//!
//! # futures::executor::block_on(async {
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&calls);
//!
//! let cache = LruCache::<String, String>::builder()
//!     .max_entries(2)
//!     .resolver(move |key: String| {
//!         let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!         async move { Ok::<_, BoxError>(Some(format!("{key}{call}"))) }
//!     })
//!     .build()?;
//!
//! assert_eq!(cache.get(&"a".to_string()).await?.as_deref(), Some("a1"));
//! assert_eq!(cache.get(&"b".to_string()).await?.as_deref(), Some("b2"));
//! assert_eq!(cache.get(&"c".to_string()).await?.as_deref(), Some("c3"));
//!
//! // "a" was evicted to make room for "c" and is resolved again.
//! assert_eq!(cache.get(&"a".to_string()).await?.as_deref(), Some("a4"));
//! assert_eq!(calls.load(Ordering::SeqCst), 4);
//! # Ok::<(), lruflight::Error>(())
//! # });
//! ```
//!
//! # Outcomes
//!
//! A lookup yields one of three results:
//!
//! - `Ok(Some(value))`: a cached or freshly resolved value.
//! - `Ok(None)`: no value. Either the key is missing and there is no resolver, the
//!   entry was stale, or the resolver reported that there is nothing to cache.
//! - `Err(error)`: the resolver failed. Every caller that waited on that resolution
//!   receives the same error and the key is left uncached.
//!
//! # Concurrency
//!
//! All index mutations happen under a single short critical section. Resolvers run
//! outside it, so other keys stay fully available while one key is being resolved.
//! Deleting, overwriting or clearing a key while it is being resolved never disturbs
//! the callers already waiting: they receive the in-flight outcome, and the next
//! lookup starts fresh.

mod builder;
mod cache;
mod config;
mod entry;
mod error;
mod eviction;
mod index;
mod resolve;

pub use builder::CacheBuilder;
pub use cache::{CacheName, LruCache};
pub use config::CacheConfig;
pub use error::{BoxError, Error, Result};
pub use resolve::{Resolve, ResolveFuture};
