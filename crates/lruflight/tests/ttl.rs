// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for TTL expiry, driven by a controlled clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::executor::block_on;
use lruflight::{BoxError, Error, LruCache};
use tick::ClockControl;

type TestResult = Result<(), Error>;

const TTL: Duration = Duration::from_millis(100);

fn expiring(control: &ClockControl) -> LruCache<&'static str, i32> {
    LruCache::builder()
        .ttl(TTL)
        .clock(control.to_clock())
        .build()
        .expect("valid configuration")
}

#[test]
fn fresh_entry_is_present() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = expiring(&control);
        cache.set("a", 1);

        control.advance_millis(99);

        assert!(cache.has(&"a"));
        assert_eq!(cache.get(&"a").await?, Some(1));
        Ok(())
    })
}

#[test]
fn entry_expires_exactly_at_ttl() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = expiring(&control);
        cache.set("a", 1);

        control.advance(TTL);

        assert_eq!(cache.get(&"a").await?, None);
        assert!(cache.is_empty());
        Ok(())
    })
}

#[test]
fn has_drops_stale_entry() {
    let control = ClockControl::new();
    let cache = expiring(&control);
    cache.set("a", 1).set("b", 2);

    control.advance_millis(150);

    assert!(!cache.has(&"b"));
    assert_eq!(cache.keys(), ["a"]);
}

#[test]
fn set_refreshes_expiry() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = expiring(&control);
        cache.set("a", 1);

        control.advance_millis(60);
        cache.set("a", 2);
        control.advance_millis(60);

        assert_eq!(cache.get(&"a").await?, Some(2));

        control.advance_millis(40);

        assert_eq!(cache.get(&"a").await?, None);
        Ok(())
    })
}

#[test]
fn get_does_not_refresh_expiry() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = expiring(&control);
        cache.set("a", 1);

        control.advance_millis(60);
        assert_eq!(cache.get(&"a").await?, Some(1));
        control.advance_millis(60);

        assert_eq!(cache.get(&"a").await?, None);
        Ok(())
    })
}

#[test]
fn admission_sweeps_stale_entries() {
    let control = ClockControl::new();
    let cache = expiring(&control);
    cache.set("a", 1).set("b", 2);

    control.advance_millis(100);
    cache.set("c", 3);

    assert_eq!(cache.keys(), ["c"]);
    assert_eq!(cache.len(), 1);
}

#[test]
fn evict_sweeps_from_least_recent() {
    let control = ClockControl::new();
    let cache = expiring(&control);
    cache.set("a", 1).set("b", 2);
    control.advance_millis(50);
    cache.set("c", 3);
    control.advance_millis(50);

    cache.evict();

    assert_eq!(cache.keys(), ["c"]);
}

#[test]
fn evict_stops_at_first_fresh_entry() {
    let control = ClockControl::new();
    let cache = expiring(&control);
    cache.set("a", 1);
    control.advance_millis(50);
    cache.set("b", 2);

    // "a" is now the most recent entry but keeps its first expiry.
    assert!(cache.has(&"a"));
    let _ = block_on(cache.get(&"a"));
    control.advance_millis(50);

    cache.evict();

    // "b" is fresh and heads the list, so the sweep leaves the stale "a" behind.
    assert_eq!(cache.keys(), ["b", "a"]);
    assert!(!cache.has(&"a"));
    assert_eq!(cache.keys(), ["b"]);
}

#[test]
fn expired_resolved_value_is_resolved_again() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let cache = LruCache::<&str, usize>::builder()
            .ttl(TTL)
            .clock(control.to_clock())
            .resolver(move |_key: &str| {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, BoxError>(Some(call)) }
            })
            .build()?;

        assert_eq!(cache.get(&"a").await?, Some(1));
        control.advance_millis(50);
        assert_eq!(cache.get(&"a").await?, Some(1));
        control.advance_millis(50);

        // The stale lookup reports nothing and drops the entry.
        assert_eq!(cache.get(&"a").await?, None);
        assert_eq!(cache.get(&"a").await?, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    })
}

#[test]
fn capacity_and_ttl_combine() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = LruCache::<&str, i32>::builder()
            .max_entries(2)
            .ttl(TTL)
            .clock(control.to_clock())
            .build()?;

        cache.set("a", 1);
        control.advance_millis(100);
        cache.set("b", 2).set("c", 3);

        assert_eq!(cache.keys(), ["b", "c"]);
        assert_eq!(cache.get(&"b").await?, Some(2));
        Ok(())
    })
}

#[test]
fn cache_reads_time_from_configured_clock() {
    let control = ClockControl::new();
    let cache = expiring(&control);
    let before = cache.clock().instant();

    control.advance_millis(250);

    assert_eq!(cache.clock().instant() - before, Duration::from_millis(250));
}

#[test]
fn default_clock_follows_system_time() -> TestResult {
    block_on(async {
        let cache = LruCache::<&str, i32>::builder().ttl(Duration::from_secs(60)).build()?;
        let before = cache.clock().instant();

        cache.set("a", 1);

        assert!(cache.clock().instant() >= before);
        assert_eq!(cache.get(&"a").await?, Some(1));
        Ok(())
    })
}
