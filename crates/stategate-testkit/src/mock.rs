//! Scripted processes for unit testing
//!
//! A `MockProcess` describes what an evaluation of that process should do:
//! which memory it yields, which checkpoint fields it reports, how long it
//! takes and whether it fails. A `CompletionProbe` lets tests observe
//! evaluations that keep running after their request was answered.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use stategate_testkit::mock::{MockProcess, MockProcessTable};
//!
//! let table = MockProcessTable::new()
//!     .with_process(MockProcess::new("fast", b"memory".to_vec()))
//!     .with_process(
//!         MockProcess::new("slow", b"memory".to_vec()).with_delay(Duration::from_secs(1)),
//!     );
//!
//! assert_eq!(table.len(), 2);
//! assert!(table.get("slow").is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted evaluation of a single process
#[derive(Debug, Clone)]
pub struct MockProcess {
    /// Process identifier
    pub id: String,
    /// Memory the evaluation yields
    pub memory: Vec<u8>,
    /// Reported `Last-Timestamp`
    pub timestamp: Option<u64>,
    /// Reported `Last-Ordinate`
    pub ordinate: Option<String>,
    /// Reported `Last-Block-Height`
    pub block_height: Option<u64>,
    /// Time the evaluation takes (zero settles on first poll)
    pub delay: Duration,
    /// Error message to fail with after `delay`
    pub failure: Option<String>,
}

impl MockProcess {
    /// Create a process that evaluates instantly to `memory`
    pub fn new(id: impl Into<String>, memory: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            memory,
            timestamp: None,
            ordinate: None,
            block_height: None,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    /// Set the reported timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the reported ordinate
    pub fn with_ordinate(mut self, ordinate: impl Into<String>) -> Self {
        self.ordinate = Some(ordinate.into());
        self
    }

    /// Set the reported block height
    pub fn with_block_height(mut self, block_height: u64) -> Self {
        self.block_height = Some(block_height);
        self
    }

    /// Set how long the evaluation takes
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make the evaluation fail
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

/// Set of scripted processes keyed by id
#[derive(Debug, Clone, Default)]
pub struct MockProcessTable {
    processes: HashMap<String, MockProcess>,
}

impl MockProcessTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a process (builder pattern)
    pub fn with_process(mut self, process: MockProcess) -> Self {
        self.add_process(process);
        self
    }

    /// Add a process, replacing any with the same id
    pub fn add_process(&mut self, process: MockProcess) {
        self.processes.insert(process.id.clone(), process);
    }

    /// Look up a process by id
    pub fn get(&self, id: &str) -> Option<&MockProcess> {
        self.processes.get(id)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Create a table of `count` instant processes named `process-{i}`
///
/// Each memory is the process index repeated 16 times, so bodies are easy to
/// tell apart in assertions.
pub fn create_test_table(count: usize) -> MockProcessTable {
    (0..count).fold(MockProcessTable::new(), |table, i| {
        table.with_process(
            MockProcess::new(format!("process-{i}"), vec![i as u8; 16])
                .with_timestamp(1_700_000_000_000 + i as u64)
                .with_ordinate(format!("{i:012}"))
                .with_block_height(1_000_000 + i as u64),
        )
    })
}

/// Side channel counting evaluations as they start and settle
#[derive(Debug, Default)]
pub struct CompletionProbe {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl CompletionProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_start(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Evaluations that completed or failed
    pub fn settled(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Wait until at least `count` evaluations settled
    ///
    /// Returns `false` if `timeout` passed first.
    pub async fn wait_for_settled(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.settled() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_process_creation() {
        let process = MockProcess::new("p", b"mem".to_vec());
        assert_eq!(process.id, "p");
        assert_eq!(process.memory, b"mem");
        assert!(process.delay.is_zero());
        assert!(process.failure.is_none());
        assert!(process.timestamp.is_none());
    }

    #[test]
    fn test_mock_process_builder() {
        let process = MockProcess::new("p", vec![])
            .with_timestamp(10)
            .with_ordinate("3")
            .with_block_height(99)
            .with_delay(Duration::from_millis(25))
            .with_failure("boom");

        assert_eq!(process.timestamp, Some(10));
        assert_eq!(process.ordinate.as_deref(), Some("3"));
        assert_eq!(process.block_height, Some(99));
        assert_eq!(process.delay, Duration::from_millis(25));
        assert_eq!(process.failure.as_deref(), Some("boom"));
    }

    #[test]
    fn test_table_replaces_by_id() {
        let mut table = MockProcessTable::new().with_process(MockProcess::new("a", vec![1]));
        table.add_process(MockProcess::new("a", vec![2]));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a").map(|p| p.memory.clone()), Some(vec![2]));
        assert!(table.get("b").is_none());
    }

    #[test]
    fn test_create_test_table() {
        let table = create_test_table(3);
        assert_eq!(table.len(), 3);
        assert!(table.get("process-3").is_none());
        assert_eq!(table.get("process-2").map(|p| p.memory[0]), Some(2));
        assert_eq!(
            table.get("process-1").and_then(|p| p.ordinate.clone()),
            Some("000000000001".to_string())
        );
    }

    #[tokio::test]
    async fn test_completion_probe() {
        let probe = CompletionProbe::new();
        let worker = probe.clone();

        tokio::spawn(async move {
            worker.record_start();
            tokio::time::sleep(Duration::from_millis(20)).await;
            worker.record_completion();
        });

        assert!(probe.wait_for_settled(1, Duration::from_secs(5)).await);
        assert_eq!(probe.started(), 1);
        assert_eq!(probe.completed(), 1);
        assert_eq!(probe.failed(), 0);
        assert!(!probe.wait_for_settled(2, Duration::from_millis(20)).await);
    }
}
