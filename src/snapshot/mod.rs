//! Process state snapshots
//!
//! Request validation, evaluation results and the assembly of state read
//! responses on top of the busy gate.
//!
//! ## Response shapes
//!
//! - `200 OK` - `application/octet-stream` memory, optional `Last-*` headers
//! - `202 Accepted` - `{"message": "..."}` while the evaluation is still running

mod assembler;
mod outcome;
mod types;

pub use assembler::{
    LAST_BLOCK_HEIGHT, LAST_ORDINATE, LAST_TIMESTAMP, OCTET_STREAM, ResponseGuard,
    assemble_state_response, busy_response, checkpoint_headers, snapshot_response,
};
pub use outcome::{Outcome, OutcomeSnapshot, OutcomeStats};
pub use types::{
    Checkpoint, EvaluationResult, InProgress, LATEST, MemoryView, StateError, StateRequest,
};
