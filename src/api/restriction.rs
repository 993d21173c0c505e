//! Process allow/restrict lists
//!
//! Runs as a route layer in front of the state route so that a rejected
//! process never reaches the evaluator.

use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashSet;
use tracing::debug;

use super::error::ApiError;
use super::state::ApiState;
use crate::config::ProcessListConfig;

/// Allow/restrict lists keyed by process id
#[derive(Debug, Clone, Default)]
pub struct ProcessGuard {
    allow: HashSet<String>,
    restrict: HashSet<String>,
}

impl ProcessGuard {
    /// Admit every process
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Build from configuration lists
    pub fn from_config(config: &ProcessListConfig) -> Self {
        Self {
            allow: config.allow.iter().cloned().collect(),
            restrict: config.restrict.iter().cloned().collect(),
        }
    }

    /// Whether `process_id` may be read
    ///
    /// A non-empty allow list admits only its members; the restrict list
    /// always wins.
    pub fn is_allowed(&self, process_id: &str) -> bool {
        if self.restrict.contains(process_id) {
            return false;
        }
        self.allow.is_empty() || self.allow.contains(process_id)
    }

    /// Reject `process_id` with [`ApiError::Forbidden`] if it may not be read
    pub fn check(&self, process_id: &str) -> Result<(), ApiError> {
        if self.is_allowed(process_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(process_id.to_string()))
        }
    }
}

/// Middleware rejecting requests for disallowed processes
pub async fn restrict_processes(
    State(state): State<ApiState>,
    Path(process_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(e) = state.processes().check(&process_id) {
        debug!(process_id = %process_id, "Rejecting restricted process");
        return Err(e);
    }

    Ok(next.run(request).await)
}
