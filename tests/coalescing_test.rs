use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use feature_flag_cache::{FlagCache, FlagCacheOptions, FlagLookup, FlagMap};
use test_log::test;

fn slow_lookup(calls: Arc<AtomicUsize>, result: FlagMap, delay: Duration) -> impl FlagLookup {
    move |_names: Vec<String>| {
        calls.fetch_add(1, Ordering::SeqCst);
        let result = result.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok::<_, anyhow::Error>(result)
        }
    }
}

#[test(tokio::test)]
async fn concurrent_refreshes_share_one_lookup() {
    let calls = Arc::new(AtomicUsize::new(0));
    let options = FlagCacheOptions::default().with_lookup(slow_lookup(
        Arc::clone(&calls),
        FlagMap::from([("rollout".to_string(), true)]),
        Duration::from_millis(50),
    ));
    let cache = Arc::new(FlagCache::new(options).unwrap());

    let mut refreshes = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        refreshes.push(tokio::spawn(async move { cache.refresh().await }));
    }
    for refresh in refreshes {
        refresh.await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_enabled("rollout"));
}

#[test(tokio::test)]
async fn followers_resolve_after_the_leaders_merge() {
    let calls = Arc::new(AtomicUsize::new(0));
    let options = FlagCacheOptions::default().with_lookup(slow_lookup(
        Arc::clone(&calls),
        FlagMap::from([("rollout".to_string(), true)]),
        Duration::from_millis(50),
    ));
    let cache = Arc::new(FlagCache::new(options).unwrap());

    let leader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.refresh().await })
    };
    // Let the leader reach its lookup before joining as a follower.
    tokio::time::sleep(Duration::from_millis(10)).await;

    cache.refresh().await;
    assert!(
        cache.is_enabled("rollout"),
        "the merge must be visible as soon as a follower resolves"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    leader.await.unwrap();
}

#[test(tokio::test)]
async fn sequential_refreshes_each_perform_a_lookup() {
    let calls = Arc::new(AtomicUsize::new(0));
    let options = FlagCacheOptions::default().with_lookup(slow_lookup(
        Arc::clone(&calls),
        FlagMap::new(),
        Duration::ZERO,
    ));
    let cache = FlagCache::new(options).unwrap();

    cache.refresh().await;
    cache.refresh().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
