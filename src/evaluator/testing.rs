//! Evaluator over a scripted mock process table

use async_trait::async_trait;
use stategate_testkit::mock::{CompletionProbe, MockProcessTable};
use std::sync::Arc;

use super::traits::{EvalError, EvalResult, Evaluator};
use crate::snapshot::{Checkpoint, EvaluationResult, StateRequest};

/// Plays back `MockProcess` scripts and reports to a `CompletionProbe`
pub(crate) struct TableEvaluator {
    table: MockProcessTable,
    probe: Arc<CompletionProbe>,
}

impl TableEvaluator {
    pub(crate) fn new(table: MockProcessTable) -> (Self, Arc<CompletionProbe>) {
        let probe = CompletionProbe::new();
        (
            Self {
                table,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait]
impl Evaluator for TableEvaluator {
    fn name(&self) -> &str {
        "table"
    }

    async fn read_state(&self, request: StateRequest) -> EvalResult<EvaluationResult> {
        let process = self
            .table
            .get(&request.process_id)
            .cloned()
            .ok_or_else(|| EvalError::NotFound(request.process_id.clone()))?;

        self.probe.record_start();

        if !process.delay.is_zero() {
            tokio::time::sleep(process.delay).await;
        }

        if let Some(failure) = process.failure {
            self.probe.record_failure();
            return Err(EvalError::Failed(failure));
        }

        self.probe.record_completion();
        Ok(EvaluationResult::new(process.memory).with_checkpoint(Checkpoint {
            timestamp: process.timestamp,
            ordinate: process.ordinate,
            block_height: process.block_height,
        }))
    }
}
