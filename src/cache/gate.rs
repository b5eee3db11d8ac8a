//! # Single-Flight Gate
//!
//! Mutual exclusion for refresh episodes: one caller per episode wins
//! leadership and performs the work, every concurrent caller waits for that
//! episode's completion signal instead of repeating it.
//!
//! The gate knows nothing about flags and is reusable across any number of
//! episodes.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::CacheError;

/// Outcome of [`SingleFlightGate::try_acquire`].
#[derive(Debug)]
pub enum GateAttempt {
    /// The caller owns this episode: perform the work, then call
    /// [`SingleFlightGate::release`].
    Leader,
    /// Another episode is in flight; wait on the listener instead.
    Follower(GateListener),
}

/// Handle on the completion signal of the episode it was captured from.
#[derive(Debug)]
pub struct GateListener {
    receiver: broadcast::Receiver<()>,
}

impl GateListener {
    /// Resolves once the episode's leader releases the gate.
    pub async fn wait(mut self) {
        // A delivered signal and a closed channel both mean the episode ended.
        let _ = self.receiver.recv().await;
    }
}

/// Gate allowing at most one in-flight episode at a time.
///
/// `None` is idle; `Some` holds the in-flight episode's completion signal.
/// The lock guards only the slot swap and is never held across an await, so
/// the gate stays correct on a multi-threaded scheduler.
#[derive(Debug, Default)]
pub struct SingleFlightGate {
    signal: Mutex<Option<broadcast::Sender<()>>>,
}

impl SingleFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to start a new episode.
    ///
    /// Returns [`GateAttempt::Leader`] when the gate was idle. Otherwise the
    /// caller becomes a follower and receives a listener already subscribed
    /// to the live episode's signal. The subscription happens in the same
    /// critical section that observed the in-flight state, so a release
    /// racing this call cannot strand the follower on a stale signal.
    pub fn try_acquire(&self) -> GateAttempt {
        let mut signal = self.signal.lock().expect("gate lock poisoned");
        match signal.as_ref() {
            Some(sender) => GateAttempt::Follower(GateListener {
                receiver: sender.subscribe(),
            }),
            None => {
                let (sender, _) = broadcast::channel(1);
                *signal = Some(sender);
                GateAttempt::Leader
            }
        }
    }

    /// Ends the current episode and wakes every follower.
    ///
    /// Fails with [`CacheError::InvalidState`] when no episode is in flight:
    /// releasing an idle gate is a bug in the caller.
    pub fn release(&self) -> Result<(), CacheError> {
        let sender = self
            .signal
            .lock()
            .expect("gate lock poisoned")
            .take()
            .ok_or_else(|| CacheError::InvalidState("release on an idle gate".to_string()))?;
        let _ = sender.send(());
        Ok(())
    }

    /// Unconditionally resets the gate, waking any followers.
    ///
    /// Callable by non-leaders; intended for forced resets in tests and
    /// recovery paths. Normal episode teardown goes through
    /// [`SingleFlightGate::release`].
    pub fn force_release(&self) {
        if let Some(sender) = self.signal.lock().expect("gate lock poisoned").take() {
            debug!("Force-releasing in-flight gate");
            let _ = sender.send(());
        }
    }

    /// Waits for the in-flight episode to complete.
    ///
    /// Fails with [`CacheError::InvalidState`] when the gate is idle; there
    /// is nothing to wait for.
    pub async fn await_release(&self) -> Result<(), CacheError> {
        let mut receiver = {
            let signal = self.signal.lock().expect("gate lock poisoned");
            match signal.as_ref() {
                Some(sender) => sender.subscribe(),
                None => {
                    return Err(CacheError::InvalidState(
                        "waiting on an idle gate".to_string(),
                    ));
                }
            }
        };
        let _ = receiver.recv().await;
        Ok(())
    }

    /// True when no episode is in flight.
    pub fn is_idle(&self) -> bool {
        self.signal.lock().expect("gate lock poisoned").is_none()
    }
}
