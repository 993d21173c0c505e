//! Stategate Test Kit
//!
//! Test infrastructure for exercising state reads without a real evaluator.
//!
//! This crate provides:
//! - Scripted mock processes (memory, checkpoint, delay, failure)
//! - Completion probes to observe evaluations that outlive their request
//! - Seeded random data generation for reproducible memory snapshots
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use stategate_testkit::mock::{MockProcess, MockProcessTable};
//! use stategate_testkit::random::PseudoGenerator;
//!
//! let mut rng = PseudoGenerator::new(12345);
//! let table = MockProcessTable::new().with_process(
//!     MockProcess::new(rng.random_process_id(), rng.random_memory(1024))
//!         .with_delay(Duration::from_millis(200)),
//! );
//! assert_eq!(table.len(), 1);
//! ```

pub mod mock;
pub mod random;

// Re-exports for convenience
pub use mock::{CompletionProbe, MockProcess, MockProcessTable};
pub use random::PseudoGenerator;
