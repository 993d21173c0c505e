//! Process state request and evaluation result types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rendering of an absent `to` in busy acknowledgments
pub const LATEST: &str = "latest";

/// Validation errors for inbound state requests
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("an ao process id is required")]
    MissingProcessId,

    #[error("Invalid 'to' position '{0}': expected a non-negative integer")]
    InvalidTo(String),
}

/// A validated request for the state of a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRequest {
    /// Process identifier (non-empty)
    pub process_id: String,
    /// Logical position to evaluate to; `None` means latest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
}

impl StateRequest {
    /// Validate raw path and query input
    ///
    /// An empty `to` is treated as absent. Numeric forms such as `12.0` or
    /// `1e3` are accepted when they denote a non-negative integer.
    pub fn parse(process_id: &str, to: Option<&str>) -> Result<Self, StateError> {
        if process_id.trim().is_empty() {
            return Err(StateError::MissingProcessId);
        }

        let to = match to.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_position(raw)?),
        };

        Ok(Self {
            process_id: process_id.to_string(),
            to,
        })
    }

    /// Textual position for messages: the number, or `latest`
    pub fn to_label(&self) -> String {
        self.to
            .map(|to| to.to_string())
            .unwrap_or_else(|| LATEST.to_string())
    }
}

fn parse_position(raw: &str) -> Result<u64, StateError> {
    if let Ok(position) = raw.parse::<u64>() {
        return Ok(position);
    }

    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => {
            Ok(n as u64)
        }
        _ => Err(StateError::InvalidTo(raw.to_string())),
    }
}

/// Trailing position an evaluation result was produced at
///
/// Each field is independently optional. Zero numbers and an empty ordinate
/// carry no position and count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

impl Checkpoint {
    /// Whether no checkpoint field is present
    pub fn is_empty(&self) -> bool {
        self.timestamp().is_none() && self.ordinate().is_none() && self.block_height().is_none()
    }

    /// The timestamp, with zero counted as absent
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp.filter(|t| *t != 0)
    }

    /// The ordinate, with an empty string counted as absent
    pub fn ordinate(&self) -> Option<&str> {
        self.ordinate.as_deref().filter(|o| !o.is_empty())
    }

    /// The block height, with zero counted as absent
    pub fn block_height(&self) -> Option<u64> {
        self.block_height.filter(|h| *h != 0)
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_ordinate(mut self, ordinate: impl Into<String>) -> Self {
        self.ordinate = Some(ordinate.into());
        self
    }

    pub fn with_block_height(mut self, block_height: u64) -> Self {
        self.block_height = Some(block_height);
        self
    }
}

/// Binary process memory as produced by an evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryView {
    /// Exclusively owned buffer
    Owned(Vec<u8>),
    /// Reference-counted buffer
    Shared(Bytes),
    /// Window into a larger shared buffer
    Window {
        buffer: Bytes,
        offset: usize,
        len: usize,
    },
}

impl MemoryView {
    /// Coerce into a contiguous buffer holding exactly the viewed bytes
    ///
    /// Windows are sliced without copying and clamped to the buffer.
    pub fn into_bytes(self) -> Bytes {
        match self {
            MemoryView::Owned(vec) => Bytes::from(vec),
            MemoryView::Shared(bytes) => bytes,
            MemoryView::Window {
                buffer,
                offset,
                len,
            } => {
                let start = offset.min(buffer.len());
                let end = start.saturating_add(len).min(buffer.len());
                buffer.slice(start..end)
            }
        }
    }

    /// Number of viewed bytes
    pub fn len(&self) -> usize {
        match self {
            MemoryView::Owned(vec) => vec.len(),
            MemoryView::Shared(bytes) => bytes.len(),
            MemoryView::Window {
                buffer,
                offset,
                len,
            } => {
                let start = (*offset).min(buffer.len());
                (*len).min(buffer.len() - start)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for MemoryView {
    fn from(vec: Vec<u8>) -> Self {
        MemoryView::Owned(vec)
    }
}

impl From<Bytes> for MemoryView {
    fn from(bytes: Bytes) -> Self {
        MemoryView::Shared(bytes)
    }
}

/// Evaluated memory of a process plus the checkpoint it was produced at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub memory: MemoryView,
    pub checkpoint: Checkpoint,
}

impl EvaluationResult {
    /// Create a result with no checkpoint metadata
    pub fn new(memory: impl Into<MemoryView>) -> Self {
        Self {
            memory: memory.into(),
            checkpoint: Checkpoint::default(),
        }
    }

    /// Attach checkpoint metadata
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = checkpoint;
        self
    }
}

/// Body of a busy acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InProgress {
    pub message: String,
}

impl InProgress {
    /// Acknowledgment for an evaluation that has not settled yet
    pub fn for_request(request: &StateRequest) -> Self {
        Self {
            message: format!(
                "Evaluation of process \"{}\" to \"{}\" is in progress.",
                request.process_id,
                request.to_label()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_to() {
        let request = StateRequest::parse("process-1", None).unwrap();
        assert_eq!(request.process_id, "process-1");
        assert_eq!(request.to, None);
        assert_eq!(request.to_label(), "latest");
    }

    #[test]
    fn test_parse_with_to() {
        let request = StateRequest::parse("process-1", Some("1700000000")).unwrap();
        assert_eq!(request.to, Some(1_700_000_000));
        assert_eq!(request.to_label(), "1700000000");
    }

    #[test]
    fn test_parse_numeric_forms() {
        assert_eq!(StateRequest::parse("p", Some("12.0")).unwrap().to, Some(12));
        assert_eq!(StateRequest::parse("p", Some("1e3")).unwrap().to, Some(1000));
        assert_eq!(StateRequest::parse("p", Some(" 5 ")).unwrap().to, Some(5));
        assert_eq!(StateRequest::parse("p", Some("")).unwrap().to, None);
    }

    #[test]
    fn test_parse_zero_renders_literally() {
        let request = StateRequest::parse("p", Some("0")).unwrap();
        assert_eq!(request.to, Some(0));
        assert_eq!(request.to_label(), "0");
    }

    #[test]
    fn test_parse_rejects_empty_process_id() {
        assert_eq!(
            StateRequest::parse("", None),
            Err(StateError::MissingProcessId)
        );
        assert_eq!(
            StateRequest::parse("   ", Some("1")),
            Err(StateError::MissingProcessId)
        );
    }

    #[test]
    fn test_parse_rejects_bad_to() {
        for raw in ["abc", "-1", "1.5", "NaN", "inf"] {
            assert_eq!(
                StateRequest::parse("p", Some(raw)),
                Err(StateError::InvalidTo(raw.to_string())),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_in_progress_message() {
        let latest = StateRequest::parse("abc", None).unwrap();
        assert_eq!(
            InProgress::for_request(&latest).message,
            "Evaluation of process \"abc\" to \"latest\" is in progress."
        );

        let pinned = StateRequest::parse("abc", Some("42")).unwrap();
        assert!(InProgress::for_request(&pinned).message.contains("\"42\""));
    }

    #[test]
    fn test_window_is_sliced() {
        let buffer = Bytes::from_static(b"headerMEMORYtrailer");
        let view = MemoryView::Window {
            buffer,
            offset: 6,
            len: 6,
        };
        assert_eq!(view.len(), 6);
        assert_eq!(view.into_bytes(), Bytes::from_static(b"MEMORY"));
    }

    #[test]
    fn test_window_is_clamped() {
        let view = MemoryView::Window {
            buffer: Bytes::from_static(b"abc"),
            offset: 2,
            len: 10,
        };
        assert_eq!(view.len(), 1);
        assert_eq!(view.into_bytes(), Bytes::from_static(b"c"));

        let past_end = MemoryView::Window {
            buffer: Bytes::from_static(b"abc"),
            offset: 9,
            len: 1,
        };
        assert!(past_end.is_empty());
        assert!(past_end.into_bytes().is_empty());
    }

    #[test]
    fn test_checkpoint_empty_ordinate_is_absent() {
        let checkpoint = Checkpoint::default().with_ordinate("");
        assert_eq!(checkpoint.ordinate(), None);
        assert!(checkpoint.is_empty());
        assert!(Checkpoint::default().with_block_height(0).is_empty());
        assert!(Checkpoint::default().with_timestamp(0).with_ordinate("").is_empty());
        assert!(!Checkpoint::default().with_block_height(1).is_empty());
    }
}
