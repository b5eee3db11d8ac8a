//! Flag storage and refresh coalescing.

pub mod gate;
pub mod store;

pub use gate::{GateAttempt, GateListener, SingleFlightGate};
pub use store::{FlagCache, LookupFailure};
