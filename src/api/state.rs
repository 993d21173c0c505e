//! API State management
//!
//! Shared state for the state API: the evaluator, the busy gate, process
//! lists and outcome counters.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::restriction::ProcessGuard;
use crate::config::Config;
use crate::evaluator::Evaluator;
use crate::snapshot::{OutcomeSnapshot, OutcomeStats};
use crate::utils::busy::BusyGate;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    evaluator: Arc<dyn Evaluator>,
    gate: BusyGate,
    processes: Arc<ProcessGuard>,
    stats: OutcomeStats,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("evaluator", &self.evaluator.name())
            .field("gate", &self.gate)
            .field("processes", &self.processes)
            .finish_non_exhaustive()
    }
}

impl ApiState {
    /// Create API state admitting every process
    pub fn new(evaluator: Arc<dyn Evaluator>, gate: BusyGate) -> Self {
        Self {
            evaluator,
            gate,
            processes: Arc::new(ProcessGuard::allow_all()),
            stats: OutcomeStats::new(),
        }
    }

    /// Build API state from configuration
    pub fn from_config(config: &Config, evaluator: Arc<dyn Evaluator>) -> Self {
        Self::new(evaluator, config.server.busy_gate())
            .with_processes(ProcessGuard::from_config(&config.processes))
    }

    /// Replace the process allow/restrict lists
    pub fn with_processes(mut self, processes: ProcessGuard) -> Self {
        self.processes = Arc::new(processes);
        self
    }

    pub fn evaluator(&self) -> Arc<dyn Evaluator> {
        self.evaluator.clone()
    }

    pub fn gate(&self) -> BusyGate {
        self.gate
    }

    pub fn processes(&self) -> &ProcessGuard {
        &self.processes
    }

    pub fn stats(&self) -> &OutcomeStats {
        &self.stats
    }

    /// Get status summary for API response
    pub fn get_status_response(&self) -> StatusResponse {
        StatusResponse {
            evaluator: self.evaluator.name().to_string(),
            busy_threshold_ms: self.gate.threshold().as_millis() as u64,
            outcomes: self.stats.snapshot(),
        }
    }
}

/// Status API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub evaluator: String,
    pub busy_threshold_ms: u64,
    pub outcomes: OutcomeSnapshot,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub busy_threshold_ms: u64,
}
