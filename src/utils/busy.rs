//! Busy-threshold execution gate
//!
//! Races an asynchronous computation against a deadline without ever
//! cancelling it:
//! - If the computation settles first, its value (or its error) is returned
//! - If the deadline elapses first, the caller gets a busy outcome right away
//!   while the computation keeps running as a detached task
//!
//! ## Built on standard primitives
//!
//! - Uses `FutureExt::now_or_never` so an already-complete computation always wins
//! - Uses `tokio::spawn` so the computation outlives the race
//! - Uses a `biased` `tokio::select!` so a computation and timer that are both
//!   ready resolve in favour of the computation
//!
//! ## Example
//!
//! ```ignore
//! use stategate::utils::busy::{BusyGate, GateOutcome};
//!
//! let gate = BusyGate::new(Duration::from_millis(50));
//! match gate.race(async move { evaluate(request).await }, || "still working").await? {
//!     GateOutcome::Settled(result) => send(result),
//!     GateOutcome::Busy(message) => acknowledge(message),
//! }
//! ```

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

/// Errors surfaced by the gate when the computation settles first
#[derive(Debug, Error)]
pub enum GateError<E: std::fmt::Display> {
    /// The computation returned an error before the threshold elapsed
    #[error("Computation failed: {0}")]
    Failed(E),

    /// The computation task panicked before the threshold elapsed
    #[error("Computation panicked: {0}")]
    Panicked(String),

    /// The runtime cancelled the computation task
    #[error("Computation cancelled")]
    Cancelled,
}

/// Outcome of a single gate invocation
///
/// `Busy` is not a failure: the computation that would have produced `T` is
/// still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<T, B = ()> {
    /// The computation settled before the threshold
    Settled(T),
    /// The threshold elapsed first; carries the `on_busy` value
    Busy(B),
}

impl<T, B> GateOutcome<T, B> {
    /// Whether the threshold elapsed before the computation settled
    pub fn is_busy(&self) -> bool {
        matches!(self, GateOutcome::Busy(_))
    }

    /// Take the settled value, if any
    pub fn settled(self) -> Option<T> {
        match self {
            GateOutcome::Settled(value) => Some(value),
            GateOutcome::Busy(_) => None,
        }
    }
}

/// A configured busy threshold
///
/// Stateless per invocation: concurrent races through the same gate never
/// wait on each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyGate {
    threshold: Duration,
}

impl BusyGate {
    /// Create a gate that reports busy after `threshold`
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// The configured threshold
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Race `computation` against this gate's threshold
    ///
    /// See [`race_with_timeout`].
    pub async fn race<T, E, B, Fut, OnBusy>(
        &self,
        computation: Fut,
        on_busy: OnBusy,
    ) -> Result<GateOutcome<T, B>, GateError<E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        OnBusy: FnOnce() -> B,
    {
        race_with_timeout(self.threshold, computation, on_busy).await
    }

    /// Race `computation` and report a detached result to `on_detached`
    ///
    /// See [`race_observed`].
    pub async fn race_observed<T, E, B, Fut, OnBusy, OnDetached>(
        &self,
        computation: Fut,
        on_busy: OnBusy,
        on_detached: OnDetached,
    ) -> Result<GateOutcome<T, B>, GateError<E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        OnBusy: FnOnce() -> B,
        OnDetached: FnOnce(Result<T, GateError<E>>) + Send + 'static,
    {
        race_observed(self.threshold, computation, on_busy, on_detached).await
    }
}

/// Race a computation against a timer of `threshold`
///
/// The computation is polled once inline; if it is already complete it wins
/// even with a zero threshold. Otherwise it is spawned and raced against the
/// timer. When the timer wins, `on_busy` is invoked and its value returned as
/// [`GateOutcome::Busy`]; the spawned computation is handed to a background
/// observer that logs its eventual outcome and is never aborted.
///
/// Errors from a computation that settles first are returned as
/// [`GateError::Failed`], never folded into a busy outcome.
pub async fn race_with_timeout<T, E, B, Fut, OnBusy>(
    threshold: Duration,
    computation: Fut,
    on_busy: OnBusy,
) -> Result<GateOutcome<T, B>, GateError<E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    OnBusy: FnOnce() -> B,
{
    race_observed(threshold, computation, on_busy, |_| {}).await
}

/// [`race_with_timeout`] with a hook for the detached result
///
/// `on_detached` is called exactly once for every busy outcome, after
/// `on_busy`, with whatever the computation eventually produced: its value,
/// its error, or the panic. It is never called when the computation settles
/// first.
pub async fn race_observed<T, E, B, Fut, OnBusy, OnDetached>(
    threshold: Duration,
    computation: Fut,
    on_busy: OnBusy,
    on_detached: OnDetached,
) -> Result<GateOutcome<T, B>, GateError<E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    OnBusy: FnOnce() -> B,
    OnDetached: FnOnce(Result<T, GateError<E>>) + Send + 'static,
{
    let started = Instant::now();
    let mut computation = Box::pin(computation);

    match std::panic::catch_unwind(AssertUnwindSafe(|| (&mut computation).now_or_never())) {
        Ok(Some(result)) => {
            debug!("Computation settled on first poll");
            return result.map(GateOutcome::Settled).map_err(GateError::Failed);
        }
        Ok(None) => {}
        Err(payload) => return Err(GateError::Panicked(panic_message(payload.as_ref()))),
    }

    let mut handle = tokio::spawn(computation);
    let timer = tokio::time::sleep(threshold);

    tokio::select! {
        biased;

        joined = &mut handle => settle(joined).map(GateOutcome::Settled),

        () = timer => {
            debug!(
                threshold_ms = threshold.as_millis() as u64,
                "Busy threshold elapsed, detaching computation"
            );
            let busy = on_busy();
            observe_detached(handle, started, on_detached);
            Ok(GateOutcome::Busy(busy))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic on first poll".to_string()
    }
}

/// Map a joined computation onto the gate's result
fn settle<T, E>(joined: Result<Result<T, E>, JoinError>) -> Result<T, GateError<E>>
where
    E: std::fmt::Display,
{
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(GateError::Failed(e)),
        Err(join_error) if join_error.is_panic() => {
            Err(GateError::Panicked(join_error.to_string()))
        }
        Err(_) => Err(GateError::Cancelled),
    }
}

/// Keep watching a computation nobody is waiting on anymore
///
/// Late failures and panics end here so they are logged and handed to
/// `on_detached` instead of lost.
fn observe_detached<T, E, OnDetached>(
    handle: JoinHandle<Result<T, E>>,
    started: Instant,
    on_detached: OnDetached,
) where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    OnDetached: FnOnce(Result<T, GateError<E>>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = settle(handle.await);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                debug!(elapsed_ms, "Detached computation completed after busy outcome");
            }
            Err(GateError::Failed(e)) => {
                warn!(elapsed_ms, error = %e, "Detached computation failed after busy outcome");
            }
            Err(e) => {
                error!(
                    elapsed_ms,
                    error = %e,
                    "Detached computation did not complete after busy outcome"
                );
            }
        }

        on_detached(result);
    });
}
