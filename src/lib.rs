//! In-memory boolean feature flag cache with coalesced refresh.
//!
//! Flag values are served synchronously from memory and refreshed from a
//! user-supplied lookup source, either on demand or on a fixed interval.
//! Concurrent refreshes are coalesced: one caller performs the actual lookup
//! while every other caller waits for its result, so a slow or unreliable
//! source is queried at most once at a time.
//!
//! # Overview
//!
//! * [`FlagCache`] - the cache itself: `is_enabled`/`add_flag` accessors and
//!   the coalescing `refresh` operation
//! * [`SingleFlightGate`] - the reusable leader/follower primitive `refresh`
//!   is built on
//! * [`RefreshPoller`] - caller-owned background task driving `refresh` on
//!   the configured interval
//! * [`FlagLookup`] - boundary to the external flag source; plain async
//!   closures qualify
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feature_flag_cache::{FlagCache, FlagCacheOptions, FlagMap, RefreshPoller};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = FlagCacheOptions::default()
//!         .with_lookup(|names: Vec<String>| async move {
//!             // Query the flag backend for `names` here.
//!             Ok::<FlagMap, anyhow::Error>(
//!                 names.into_iter().map(|name| (name, true)).collect(),
//!             )
//!         });
//!
//!     let cache = Arc::new(FlagCache::new(options).unwrap());
//!     let _poller = RefreshPoller::start(Arc::clone(&cache));
//!
//!     cache.refresh().await;
//!     assert!(cache.is_enabled("new-checkout"));
//! }
//! ```

pub mod cache;
pub mod error;
pub mod lookup;
pub mod poll;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use cache::{FlagCache, GateAttempt, GateListener, LookupFailure, SingleFlightGate};
pub use error::CacheError;
pub use lookup::{FlagLookup, FlagMap};
pub use poll::RefreshPoller;

/// Fallback refresh interval when `FLAG_REFRESH_INTERVAL_MS` is unset.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for [`FlagCache`].
#[derive(Clone)]
pub struct FlagCacheOptions {
    /// Flags preloaded before the first refresh
    pub initial_flags: Option<FlagMap>,
    /// Interval between background refreshes (used by [`RefreshPoller`])
    /// Default: `FLAG_REFRESH_INTERVAL_MS` env var, else 30 seconds
    pub refresh_interval: Duration,
    /// Source of truth for flag values; required
    pub lookup: Option<Arc<dyn FlagLookup>>,
}

impl fmt::Debug for FlagCacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagCacheOptions")
            .field("initial_flags", &self.initial_flags)
            .field("refresh_interval", &self.refresh_interval)
            .field("lookup", &self.lookup.as_ref().map(|_| "<FlagLookup>"))
            .finish()
    }
}

impl Default for FlagCacheOptions {
    fn default() -> Self {
        let refresh_interval = std::env::var("FLAG_REFRESH_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL);

        Self {
            initial_flags: None,
            refresh_interval,
            lookup: None,
        }
    }
}

impl FlagCacheOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache with `flags` before the first refresh
    pub fn with_initial_flags(mut self, flags: FlagMap) -> Self {
        self.initial_flags = Some(flags);
        self
    }

    /// Set the interval between background refreshes
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the lookup source. Plain async closures work:
    /// `Fn(Vec<String>) -> impl Future<Output = anyhow::Result<FlagMap>>`.
    pub fn with_lookup(mut self, lookup: impl FlagLookup + 'static) -> Self {
        self.lookup = Some(Arc::new(lookup));
        self
    }
}
