//! Utility modules for stategate
//!
//! Concurrency helpers shared by the state route.

pub mod busy;

pub use busy::{BusyGate, GateError, GateOutcome, race_with_timeout};
