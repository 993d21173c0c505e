//! Upstream evaluator
//!
//! Delegates evaluation to another node exposing `GET /state/{process_id}`
//! and translates its binary response and `Last-*` headers back into an
//! [`EvaluationResult`].

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::traits::{EvalError, EvalResult, Evaluator};
use crate::snapshot::{
    Checkpoint, EvaluationResult, LAST_BLOCK_HEIGHT, LAST_ORDINATE, LAST_TIMESTAMP, MemoryView,
    StateRequest,
};

/// Error body returned by an upstream node
#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    #[serde(default, alias = "error")]
    message: Option<String>,
}

/// Evaluator backed by a remote node's state endpoint
///
/// # Example
/// ```no_run
/// use stategate::evaluator::{Evaluator, UpstreamEvaluator};
/// use stategate::snapshot::StateRequest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let evaluator = UpstreamEvaluator::new("http://evaluator:6363")?;
/// let request = StateRequest::parse("my-process", None)?;
/// let result = evaluator.read_state(request).await?;
/// println!("Memory: {} bytes", result.memory.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UpstreamEvaluator {
    /// Base URL of the upstream node
    base_url: Url,
    /// HTTP client for making requests
    client: Client,
}

impl UpstreamEvaluator {
    /// Create an evaluator for the given upstream URL
    pub fn new(upstream_url: &str) -> EvalResult<Self> {
        Self::with_client(upstream_url, Client::new())
    }

    /// Create an evaluator with a per-request timeout
    ///
    /// The timeout bounds the upstream call itself, not the busy threshold:
    /// an evaluation that outlives the threshold keeps running until this
    /// timeout.
    pub fn with_timeout(upstream_url: &str, timeout: Duration) -> EvalResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(upstream_url, client)
    }

    /// Create an evaluator with a custom HTTP client
    pub fn with_client(upstream_url: &str, client: Client) -> EvalResult<Self> {
        let mut base_url = Url::parse(upstream_url)?;
        // Url::join drops the last path segment without a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { base_url, client })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn state_url(&self, request: &StateRequest) -> EvalResult<Url> {
        let mut url = self.base_url.join("state/")?;
        url.path_segments_mut()
            .map_err(|_| EvalError::Failed(format!("cannot-be-a-base URL: {}", self.base_url)))?
            .pop_if_empty()
            .push(&request.process_id);

        if let Some(to) = request.to {
            url.query_pairs_mut().append_pair("to", &to.to_string());
        }

        Ok(url)
    }
}

#[async_trait]
impl Evaluator for UpstreamEvaluator {
    fn name(&self) -> &str {
        "upstream"
    }

    async fn read_state(&self, request: StateRequest) -> EvalResult<EvaluationResult> {
        let url = self.state_url(&request)?;
        debug!(process_id = %request.process_id, url = %url, "Requesting upstream state");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EvalError::NotFound(request.process_id));
        }

        if status == reqwest::StatusCode::ACCEPTED {
            // The upstream is itself still evaluating; nothing to return yet
            let body: UpstreamErrorBody = response
                .json()
                .await
                .unwrap_or(UpstreamErrorBody { message: None });
            return Err(EvalError::Upstream {
                status: status.as_u16(),
                message: body
                    .message
                    .unwrap_or_else(|| "Upstream evaluation in progress".into()),
            });
        }

        if !status.is_success() {
            let body: UpstreamErrorBody = response
                .json()
                .await
                .unwrap_or(UpstreamErrorBody { message: None });
            return Err(EvalError::Upstream {
                status: status.as_u16(),
                message: body.message.unwrap_or_else(|| "Unknown error".into()),
            });
        }

        let checkpoint = checkpoint_from_headers(response.headers());
        let memory = response.bytes().await?;

        debug!(
            process_id = %request.process_id,
            bytes = memory.len(),
            "Received upstream state"
        );

        Ok(EvaluationResult::new(MemoryView::Shared(memory)).with_checkpoint(checkpoint))
    }
}

/// Read `Last-*` headers into a checkpoint
///
/// Unparseable numeric headers are dropped with a warning.
pub fn checkpoint_from_headers(headers: &HeaderMap) -> Checkpoint {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let number = |name: &str| {
        text(name).and_then(|v| match v.parse::<u64>() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(header = name, value = v, error = %e, "Ignoring unparseable checkpoint header");
                None
            }
        })
    };

    Checkpoint {
        timestamp: number(LAST_TIMESTAMP),
        ordinate: text(LAST_ORDINATE).map(str::to_string),
        block_height: number(LAST_BLOCK_HEIGHT),
    }
}
