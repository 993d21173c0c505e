//! State response assembly
//!
//! Turns a state request into an HTTP response by racing the evaluator
//! against the busy threshold:
//!
//! - Settled in time: `200`, `application/octet-stream`, memory as the body,
//!   plus whichever of `Last-Timestamp`, `Last-Ordinate` and
//!   `Last-Block-Height` the checkpoint carries
//! - Threshold elapsed: `202` with an in-progress message; the evaluation keeps
//!   running and its result is discarded when it lands
//! - Evaluation failed in time: the error is returned to the caller
//!
//! Only one reply is ever written per request. A [`ResponseGuard`] records
//! whether the busy acknowledgment went out so a late evaluation can see that
//! nobody is listening and drop its result instead of building a response.

use axum::Json;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::outcome::{Outcome, OutcomeStats};
use super::types::{Checkpoint, EvaluationResult, InProgress, StateRequest};
use crate::evaluator::{EvalError, Evaluator};
use crate::utils::busy::{BusyGate, GateError, GateOutcome};

/// Content type of snapshot bodies
pub const OCTET_STREAM: &str = "application/octet-stream";
/// Timestamp of the last evaluated message
pub const LAST_TIMESTAMP: &str = "last-timestamp";
/// Ordinate of the last evaluated message
pub const LAST_ORDINATE: &str = "last-ordinate";
/// Block height of the last evaluated message
pub const LAST_BLOCK_HEIGHT: &str = "last-block-height";

/// Single-writer claim on a request's response
#[derive(Debug, Clone, Default)]
pub struct ResponseGuard {
    ended: Arc<AtomicBool>,
}

impl ResponseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the response for writing
    ///
    /// Returns `false` if it was already claimed.
    pub fn try_claim(&self) -> bool {
        self.ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether a reply has already been written
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

/// What the evaluation continuation did with its result
enum Delivery {
    /// Snapshot response ready for a caller still waiting
    Written(Response),
    /// The caller was already answered; memory handed back unwritten
    Discarded(Bytes),
}

/// Race `evaluator` for `request` against `gate` and build the reply
///
/// Failures that settle before the threshold are returned as
/// [`GateError`]. Whatever an evaluation produces after a busy
/// acknowledgment (result, failure or panic) is counted by the gate's
/// detached hook as [`Outcome::LateCompleted`] or [`Outcome::LateFailed`].
pub async fn assemble_state_response(
    request: StateRequest,
    evaluator: Arc<dyn Evaluator>,
    gate: BusyGate,
    stats: OutcomeStats,
) -> Result<Response, GateError<EvalError>> {
    let guard = ResponseGuard::new();
    let in_progress = InProgress::for_request(&request);
    let process_id = request.process_id.clone();

    let computation = {
        let guard = guard.clone();
        async move {
            let process_id = request.process_id.clone();
            let result = evaluator.read_state(request).await?;
            Ok::<_, EvalError>(deliver(result, &guard, &process_id))
        }
    };

    let on_busy = {
        let guard = guard.clone();
        let stats = stats.clone();
        let acknowledgment = in_progress.clone();
        move || {
            guard.try_claim();
            stats.record(Outcome::Busy);
            acknowledgment
        }
    };

    let on_detached = {
        let stats = stats.clone();
        move |late: Result<Delivery, GateError<EvalError>>| match late {
            Ok(_) => stats.record(Outcome::LateCompleted),
            Err(_) => stats.record(Outcome::LateFailed),
        }
    };

    match gate.race_observed(computation, on_busy, on_detached).await {
        Ok(GateOutcome::Settled(Delivery::Written(response))) => {
            guard.try_claim();
            stats.record(Outcome::Completed);
            Ok(response)
        }
        Ok(GateOutcome::Settled(Delivery::Discarded(_))) => {
            // The guard only ends in `on_busy`, which already counted this
            // request as busy
            Ok(busy_response(in_progress))
        }
        Ok(GateOutcome::Busy(acknowledgment)) => {
            info!(
                process_id = %process_id,
                threshold_ms = gate.threshold().as_millis() as u64,
                "Evaluation still running, acknowledging as busy"
            );
            Ok(busy_response(acknowledgment))
        }
        Err(e) => {
            warn!(process_id = %process_id, error = %e, "Evaluation failed");
            stats.record(Outcome::Failed);
            Err(e)
        }
    }
}

/// Continuation run on the evaluation's own task once it produced a result
fn deliver(result: EvaluationResult, guard: &ResponseGuard, process_id: &str) -> Delivery {
    if guard.is_ended() {
        debug!(
            process_id,
            bytes = result.memory.len(),
            "Response already sent, discarding late evaluation result"
        );
        return Delivery::Discarded(result.memory.into_bytes());
    }

    Delivery::Written(snapshot_response(result))
}

/// `202 Accepted` with the in-progress message
pub fn busy_response(acknowledgment: InProgress) -> Response {
    (StatusCode::ACCEPTED, Json(acknowledgment)).into_response()
}

/// `200 OK` with the memory as an octet-stream body
pub fn snapshot_response(result: EvaluationResult) -> Response {
    let mut headers = checkpoint_headers(&result.checkpoint);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));

    (StatusCode::OK, headers, result.memory.into_bytes()).into_response()
}

/// `Last-*` headers for whichever checkpoint fields are present
pub fn checkpoint_headers(checkpoint: &Checkpoint) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(timestamp) = checkpoint.timestamp() {
        headers.insert(
            HeaderName::from_static(LAST_TIMESTAMP),
            HeaderValue::from(timestamp),
        );
    }

    if let Some(ordinate) = checkpoint.ordinate() {
        match HeaderValue::from_str(ordinate) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(LAST_ORDINATE), value);
            }
            Err(e) => {
                warn!(ordinate, error = %e, "Skipping ordinate that is not a valid header value");
            }
        }
    }

    if let Some(block_height) = checkpoint.block_height() {
        headers.insert(
            HeaderName::from_static(LAST_BLOCK_HEIGHT),
            HeaderValue::from(block_height),
        );
    }

    headers
}
