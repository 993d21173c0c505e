//! Stategate - bounded-latency process state reads
//!
//! Serves the evaluated memory of a process as a binary snapshot, but never
//! makes a caller wait longer than a configured busy threshold. When
//! evaluation takes longer, the caller gets `202 Accepted` and the evaluation
//! keeps running in the background so a later read can find it warm.
//!
//! ## Modules
//!
//! - [`api`] - HTTP routes, process restrictions and metrics
//! - [`config`] - YAML service configuration
//! - [`evaluator`] - Evaluator trait and the upstream implementation
//! - [`snapshot`] - Request validation and state response assembly
//! - [`utils`] - The busy gate

pub mod api;
pub mod config;
pub mod evaluator;
pub mod snapshot;
pub mod utils;
