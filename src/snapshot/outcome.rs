//! Outcome counters for state reads
//!
//! Tracks how each request ended, plus what happened to evaluations that
//! finished after their caller had already been told the process was busy.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// How a state read (or its detached evaluation) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Snapshot returned to the caller
    Completed,
    /// Caller acknowledged with 202
    Busy,
    /// Evaluation failed before the threshold
    Failed,
    /// Evaluation finished after a busy acknowledgment; result discarded
    LateCompleted,
    /// Evaluation failed or panicked after a busy acknowledgment
    LateFailed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::Busy => write!(f, "busy"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::LateCompleted => write!(f, "late_completed"),
            Outcome::LateFailed => write!(f, "late_failed"),
        }
    }
}

/// Internal mutable counters
#[derive(Debug)]
struct InnerStats {
    started_at: Instant,
    completed: u64,
    busy: u64,
    failed: u64,
    late_completed: u64,
    late_failed: u64,
}

/// Shared outcome counters
#[derive(Debug, Clone)]
pub struct OutcomeStats {
    inner: Arc<RwLock<InnerStats>>,
}

impl Default for OutcomeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(InnerStats {
                started_at: Instant::now(),
                completed: 0,
                busy: 0,
                failed: 0,
                late_completed: 0,
                late_failed: 0,
            })),
        }
    }

    /// Count one outcome
    pub fn record(&self, outcome: Outcome) {
        trace!(outcome = %outcome, "Recording state read outcome");
        let mut stats = self.inner.write();
        match outcome {
            Outcome::Completed => stats.completed += 1,
            Outcome::Busy => stats.busy += 1,
            Outcome::Failed => stats.failed += 1,
            Outcome::LateCompleted => stats.late_completed += 1,
            Outcome::LateFailed => stats.late_failed += 1,
        }
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> OutcomeSnapshot {
        let stats = self.inner.read();
        OutcomeSnapshot {
            completed: stats.completed,
            busy: stats.busy,
            failed: stats.failed,
            late_completed: stats.late_completed,
            late_failed: stats.late_failed,
            uptime_ms: stats.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// Counter values at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSnapshot {
    pub completed: u64,
    pub busy: u64,
    pub failed: u64,
    pub late_completed: u64,
    pub late_failed: u64,
    pub uptime_ms: u64,
}

impl OutcomeSnapshot {
    /// Evaluations still unaccounted for after a busy acknowledgment
    pub fn detached_pending(&self) -> u64 {
        self.busy
            .saturating_sub(self.late_completed + self.late_failed)
    }
}
