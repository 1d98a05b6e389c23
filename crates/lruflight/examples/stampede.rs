// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stampede protection example.
//!
//! Many tasks ask for the same missing key at once. The cache runs the slow backend
//! once and every task receives the same value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use lruflight::{LruCache, Resolve, ResolveFuture};

/// A slow backend that counts how many times it is called.
#[derive(Debug, Clone)]
struct SlowBackend {
    call_count: Arc<AtomicU32>,
    latency: Duration,
}

impl Resolve<String, String> for SlowBackend {
    fn resolve(&self, key: String) -> ResolveFuture<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            Ok(Some(format!("value_for_{key}")))
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), lruflight::Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).init();

    let backend = SlowBackend {
        call_count: Arc::new(AtomicU32::new(0)),
        latency: Duration::from_millis(100),
    };
    let calls = Arc::clone(&backend.call_count);

    let cache = Arc::new(
        LruCache::<String, String>::builder()
            .name("stampede")
            .max_entries(100)
            .ttl(Duration::from_secs(30))
            .resolver(backend)
            .build()?,
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&"contested_key".to_string()).await })
        })
        .collect();

    for handle in handles {
        let value = handle.await.expect("task should not panic")?;
        println!("received {value:?}");
    }

    println!(
        "10 concurrent lookups took {:?} and called the backend {} time(s)",
        start.elapsed(),
        calls.load(Ordering::Relaxed)
    );
    Ok(())
}
