//! # Flag Store
//!
//! Holds the current flag values and defines the refresh protocol on top of
//! the [`SingleFlightGate`]: acquire, look up, merge, release, or wait for
//! the refresh already in flight.
//!
//! ## Guarantees
//!
//! * Concurrent refreshes trigger at most one lookup at a time
//! * A refresh merges, it never replaces: flags absent from a lookup result
//!   keep their previous value
//! * A failed lookup leaves the cache untouched and never propagates to the
//!   caller
//! * The gate is always restored to idle, even when the lookup fails or the
//!   refresh is cancelled mid-flight

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tracing::{debug, instrument, warn};

use crate::FlagCacheOptions;
use crate::cache::gate::{GateAttempt, SingleFlightGate};
use crate::error::CacheError;
use crate::lookup::{FlagLookup, FlagMap};

/// Buffered lookup failures; further events are dropped while full.
const FAILURE_BUFFER: usize = 100;

/// Emitted on the failure stream when a leader's lookup fails.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupFailure {
    pub error: CacheError,
}

/// In-memory boolean flag cache refreshed from an external lookup source.
///
/// Reads are synchronous and never fail; refreshes are asynchronous and
/// coalesced so the lookup source sees at most one query at a time.
pub struct FlagCache {
    flags: RwLock<FlagMap>,
    lookup: Arc<dyn FlagLookup>,
    gate: SingleFlightGate,
    refresh_interval: Duration,
    failure_sender: Sender<LookupFailure>,
    failure_stream: Arc<Mutex<Option<Receiver<LookupFailure>>>>,
}

impl fmt::Debug for FlagCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagCache")
            .field("flags", &self.flags)
            .field("lookup", &"<FlagLookup>")
            .field("gate", &self.gate)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

impl FlagCache {
    /// Creates a cache from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when no lookup source is configured or
    /// the refresh interval is zero.
    #[instrument(skip(options))]
    pub fn new(options: FlagCacheOptions) -> Result<Self, CacheError> {
        let lookup = options
            .lookup
            .ok_or_else(|| CacheError::Config("flag lookup must be present".to_string()))?;
        if options.refresh_interval.is_zero() {
            return Err(CacheError::Config(
                "refresh interval must be non-zero".to_string(),
            ));
        }
        let (failure_sender, failure_receiver) = channel(FAILURE_BUFFER);

        Ok(Self {
            flags: RwLock::new(options.initial_flags.unwrap_or_default()),
            lookup,
            gate: SingleFlightGate::new(),
            refresh_interval: options.refresh_interval,
            failure_sender,
            failure_stream: Arc::new(Mutex::new(Some(failure_receiver))),
        })
    }

    /// Current value of `name`.
    ///
    /// Unknown names are registered as disabled, permanently: every future
    /// refresh includes them in its query set.
    pub fn is_enabled(&self, name: &str) -> bool {
        if let Some(enabled) = self.flags.read().expect("flag lock poisoned").get(name) {
            return *enabled;
        }

        *self
            .flags
            .write()
            .expect("flag lock poisoned")
            .entry(name.to_string())
            .or_insert(false)
    }

    /// Sets `name` to `enabled`, inserting or overwriting.
    pub fn add_flag(&self, name: impl Into<String>, enabled: bool) {
        self.flags
            .write()
            .expect("flag lock poisoned")
            .insert(name.into(), enabled);
    }

    /// Snapshot of every registered flag name.
    pub fn flag_names(&self) -> Vec<String> {
        self.flags
            .read()
            .expect("flag lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Interval between background refreshes, for use by
    /// [`RefreshPoller`](crate::RefreshPoller).
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Takes the stream of lookup failures.
    ///
    /// Returns `Some` on the first call only. While nobody consumes the
    /// stream, failures are silently dropped once the buffer fills; `refresh`
    /// itself never surfaces them.
    pub async fn failure_stream(&self) -> Option<Receiver<LookupFailure>> {
        self.failure_stream.lock().await.take()
    }

    /// Refreshes every registered flag from the lookup source.
    ///
    /// Concurrent calls coalesce: the first caller performs the lookup, all
    /// others resolve once that single lookup's merge is applied. A failed
    /// lookup keeps the previous values and surfaces only on the failure
    /// stream.
    pub async fn refresh(&self) {
        // Key set as of call time, not leader-acquisition time.
        let names = self.flag_names();

        match self.gate.try_acquire() {
            GateAttempt::Leader => {
                // Released on drop, so a failing or cancelled lookup can
                // never leave the gate stuck in flight.
                let _guard = ReleaseGuard { gate: &self.gate };
                debug!(flags = names.len(), "Refreshing flag values");
                match self.lookup.lookup(names).await {
                    Ok(fresh) => self.merge(fresh),
                    Err(error) => {
                        warn!("Flag lookup failed, keeping previous values: {}", error);
                        let _ = self.failure_sender.try_send(LookupFailure {
                            error: CacheError::from(error),
                        });
                    }
                }
            }
            GateAttempt::Follower(listener) => {
                debug!("Refresh already in flight, waiting for its result");
                listener.wait().await;
            }
        }
    }

    // Returned pairs overwrite; absent keys keep their previous value.
    fn merge(&self, fresh: FlagMap) {
        let mut flags = self.flags.write().expect("flag lock poisoned");
        for (name, enabled) in fresh {
            flags.insert(name, enabled);
        }
    }
}

/// Restores the gate to idle when the leader scope ends for any reason.
struct ReleaseGuard<'a> {
    gate: &'a SingleFlightGate,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if self.gate.release().is_err() {
            // Only reachable when the gate was force-released mid-episode.
            debug!("Gate was already idle at leader release");
        }
    }
}
