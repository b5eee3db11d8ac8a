//! Periodic refresh trigger.
//!
//! Owns the background task that refreshes a [`FlagCache`] on its configured
//! interval. The lifecycle is explicit: the task starts with
//! [`RefreshPoller::start`] and ends on [`RefreshPoller::stop`] or drop; a
//! forgotten poller never keeps refreshing on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::cache::store::FlagCache;

/// Handle on the background refresh loop of a [`FlagCache`].
#[derive(Debug)]
pub struct RefreshPoller {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshPoller {
    /// Spawns the refresh loop for `cache`, ticking at
    /// [`FlagCache::refresh_interval`].
    ///
    /// Must be called from within a tokio runtime. The first refresh fires
    /// one full interval after start, not immediately; call
    /// [`FlagCache::refresh`] directly when the initial values matter.
    pub fn start(cache: Arc<FlagCache>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let task_shutdown = Arc::clone(&shutdown);
        let interval = cache.refresh_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A slow lookup delays the next poll rather than queueing a burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The initial tick completes immediately; consume it so the loop
            // waits a full interval before the first refresh.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if task_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                cache.refresh().await;
            }
        });

        debug!(
            interval_ms = interval.as_millis() as u64,
            "Started flag refresh poller"
        );
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stops the refresh loop. Idempotent; also called on drop.
    ///
    /// A refresh in flight when this is called is cancelled; the cache's
    /// gate recovers through its release guard.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Stopped flag refresh poller");
        }
    }
}

impl Drop for RefreshPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
