use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use feature_flag_cache::{FlagCache, FlagCacheOptions, FlagMap, RefreshPoller};
use test_log::test;

fn counted_cache(calls: Arc<AtomicUsize>, interval: Duration) -> Arc<FlagCache> {
    let options = FlagCacheOptions::default()
        .with_refresh_interval(interval)
        .with_lookup(move |_names: Vec<String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<FlagMap, anyhow::Error>(FlagMap::new()) }
        });
    Arc::new(FlagCache::new(options).unwrap())
}

#[test(tokio::test)]
async fn poller_drives_periodic_refreshes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = counted_cache(Arc::clone(&calls), Duration::from_millis(20));

    let mut poller = RefreshPoller::start(Arc::clone(&cache));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        calls.load(Ordering::SeqCst) >= 2,
        "expected repeated refreshes while the poller runs"
    );

    poller.stop();
    let settled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), settled);
}

#[test(tokio::test)]
async fn stop_is_idempotent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = counted_cache(Arc::clone(&calls), Duration::from_millis(20));

    let mut poller = RefreshPoller::start(cache);
    poller.stop();
    poller.stop();
}

#[test(tokio::test)]
async fn dropping_the_poller_stops_it() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = counted_cache(Arc::clone(&calls), Duration::from_millis(20));

    {
        let _poller = RefreshPoller::start(Arc::clone(&cache));
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    let settled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), settled);
}
