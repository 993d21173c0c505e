//! Evaluator trait and supporting types
//!
//! An `Evaluator` produces the memory of a process as of a logical position.
//! How it gets there (replaying history, loading a checkpoint, asking another
//! node) is its own business; the state route only races it against the busy
//! threshold.

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::{EvaluationResult, StateRequest};

/// Errors that can occur while evaluating process state
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Upstream error: {message} (status: {status})")]
    Upstream { status: u16, message: String },

    #[error("Process not found: {0}")]
    NotFound(String),

    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// Result type for evaluator operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Produces the evaluated memory of a process
///
/// Implementations must be cheap to share: the state route holds one behind an
/// `Arc` and may run many evaluations concurrently, including several for the
/// same process. Deduplicating concurrent evaluations is up to the
/// implementation.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Evaluate `request.process_id` up to `request.to` (or latest)
    async fn read_state(&self, request: StateRequest) -> EvalResult<EvaluationResult>;
}
