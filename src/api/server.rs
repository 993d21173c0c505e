//! HTTP Server for the state API
//!
//! Axum-based HTTP server providing the state route and its status endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::metrics::metrics_handler;
use super::restriction::restrict_processes;
use super::state::{ApiState, HealthResponse, StatusResponse};
use crate::snapshot::{LATEST, StateRequest, assemble_state_response};

/// Start the API server on the given port
///
/// Serves until ctrl-c. Evaluations still running past their busy reply are
/// dropped with the runtime.
pub async fn start_api_server(
    port: u16,
    state: ApiState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = port, "Starting state API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("State API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    let state_routes = Router::new()
        .route("/state/:process_id", get(state_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            restrict_processes,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .merge(state_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query parameters of the state route
#[derive(Debug, Deserialize)]
pub struct StateQuery {
    /// Logical position to evaluate to; latest when absent
    pub to: Option<String>,
}

/// State endpoint
///
/// Returns the process memory if evaluation finishes within the busy
/// threshold, otherwise `202 Accepted` while evaluation continues.
#[tracing::instrument(
    name = "read_state",
    skip_all,
    fields(process_id = %process_id, to = query.to.as_deref().unwrap_or(LATEST))
)]
async fn state_handler(
    State(state): State<ApiState>,
    Path(process_id): Path<String>,
    Query(query): Query<StateQuery>,
) -> Result<Response, ApiError> {
    let request = StateRequest::parse(&process_id, query.to.as_deref())?;
    debug!(evaluator = state.evaluator().name(), "Reading state");

    let response = assemble_state_response(
        request,
        state.evaluator(),
        state.gate(),
        state.stats().clone(),
    )
    .await?;

    Ok(response)
}

/// Health check endpoint
async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        busy_threshold_ms: state.gate().threshold().as_millis() as u64,
    })
}

/// Status endpoint
///
/// Returns outcome counters since startup.
async fn status_handler(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(state.get_status_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorBody;
    use crate::api::restriction::ProcessGuard;
    use crate::config::ProcessListConfig;
    use crate::evaluator::testing::TableEvaluator;
    use crate::snapshot::{
        InProgress, LAST_BLOCK_HEIGHT, LAST_ORDINATE, LAST_TIMESTAMP, OCTET_STREAM,
    };
    use crate::utils::busy::BusyGate;
    use axum::body::{Body, Bytes, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use stategate_testkit::mock::{
        CompletionProbe, MockProcess, MockProcessTable, create_test_table,
    };
    use stategate_testkit::random::PseudoGenerator;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_table() -> MockProcessTable {
        MockProcessTable::new()
            .with_process(
                MockProcess::new("fast", b"fast memory".to_vec())
                    .with_timestamp(1_700_000_000_000)
                    .with_ordinate("12")
                    .with_block_height(1_400_000),
            )
            .with_process(
                MockProcess::new("slow", b"slow memory".to_vec())
                    .with_delay(Duration::from_millis(300)),
            )
            .with_process(MockProcess::new("broken", vec![]).with_failure("module load failed"))
    }

    fn test_state(threshold: Duration) -> (ApiState, Arc<CompletionProbe>) {
        let (evaluator, probe) = TableEvaluator::new(test_table());
        (
            ApiState::new(Arc::new(evaluator), BusyGate::new(threshold)),
            probe,
        )
    }

    async fn call(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body(response: Response) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _probe) = test_state(Duration::from_millis(750));
        let response = call(create_router(state), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body(response).await).unwrap();
        assert!(health.healthy);
        assert_eq!(health.busy_threshold_ms, 750);
    }

    #[tokio::test]
    async fn test_state_completes_within_threshold() {
        let (state, _probe) = test_state(Duration::from_secs(2));
        let response = call(create_router(state), "/state/fast").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], OCTET_STREAM);
        assert_eq!(response.headers()[LAST_TIMESTAMP], "1700000000000");
        assert_eq!(response.headers()[LAST_ORDINATE], "12");
        assert_eq!(response.headers()[LAST_BLOCK_HEIGHT], "1400000");
        assert_eq!(body(response).await.as_ref(), b"fast memory");
    }

    #[tokio::test]
    async fn test_state_busy_past_threshold() {
        let (state, probe) = test_state(Duration::from_millis(50));
        let response = call(create_router(state.clone()), "/state/slow?to=1700").await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let ack: InProgress = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(
            ack.message,
            "Evaluation of process \"slow\" to \"1700\" is in progress."
        );

        // Evaluation outlives the request
        assert!(probe.wait_for_settled(1, Duration::from_secs(5)).await);
        assert_eq!(probe.completed(), 1);
    }

    #[tokio::test]
    async fn test_state_failure_maps_to_bad_gateway() {
        let (state, _probe) = test_state(Duration::from_secs(2));
        let response = call(create_router(state.clone()), "/state/broken").await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let error: ErrorBody = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(error.code, "EVALUATION_FAILED");
        assert!(error.error.contains("module load failed"));
        assert_eq!(state.stats().snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_process_is_not_found() {
        let (state, _probe) = test_state(Duration::from_secs(2));
        let response = call(create_router(state), "/state/nobody").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ErrorBody = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(error.code, "PROCESS_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_concurrent_reads_of_same_process() {
        let (state, probe) = test_state(Duration::from_secs(2));
        let app = create_router(state.clone());

        let (first, second) = tokio::join!(
            call(app.clone(), "/state/slow"),
            call(app.clone(), "/state/slow")
        );

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body(first).await.as_ref(), b"slow memory");
        assert_eq!(body(second).await.as_ref(), b"slow memory");
        assert_eq!(probe.started(), 2);
        assert_eq!(state.stats().snapshot().completed, 2);
    }

    #[tokio::test]
    async fn test_distinct_processes_served_independently() {
        let mut rng = PseudoGenerator::new(2024);
        let random_id = rng.random_process_id();
        let random_memory = rng.random_memory(8192);

        let mut table = create_test_table(3);
        table.add_process(MockProcess::new(random_id.clone(), random_memory.clone()));
        let (evaluator, probe) = TableEvaluator::new(table);
        let app = create_router(ApiState::new(
            Arc::new(evaluator),
            BusyGate::new(Duration::from_secs(2)),
        ));

        for i in 0..3u8 {
            let response = call(app.clone(), &format!("/state/process-{i}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[LAST_ORDINATE], format!("{i:012}").as_str());
            assert_eq!(body(response).await.as_ref(), vec![i; 16].as_slice());
        }

        let response = call(app, &format!("/state/{random_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(LAST_TIMESTAMP));
        assert_eq!(body(response).await.as_ref(), random_memory.as_slice());
        assert_eq!(probe.completed(), 4);
    }

    #[tokio::test]
    async fn test_invalid_to_rejected_before_evaluation() {
        let (state, probe) = test_state(Duration::from_secs(2));
        let response = call(create_router(state), "/state/fast?to=yesterday").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorBody = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(error.code, "INVALID_REQUEST");
        assert_eq!(probe.started(), 0);
    }

    #[tokio::test]
    async fn test_blank_process_id_rejected() {
        let (state, probe) = test_state(Duration::from_secs(2));
        let response = call(create_router(state), "/state/%20").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(probe.started(), 0);
    }

    #[tokio::test]
    async fn test_restricted_process_forbidden_before_evaluation() {
        let (state, probe) = test_state(Duration::from_secs(2));
        let state = state.with_processes(ProcessGuard::from_config(&ProcessListConfig {
            allow: vec![],
            restrict: vec!["fast".to_string()],
        }));
        let app = create_router(state);

        let response = call(app.clone(), "/state/fast").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let error: ErrorBody = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(error.code, "PROCESS_FORBIDDEN");
        assert_eq!(probe.started(), 0);

        let response = call(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_and_metrics_reflect_outcomes() {
        let (state, _probe) = test_state(Duration::from_secs(2));
        let app = create_router(state);

        assert_eq!(call(app.clone(), "/state/fast").await.status(), StatusCode::OK);
        assert_eq!(
            call(app.clone(), "/state/broken").await.status(),
            StatusCode::BAD_GATEWAY
        );

        let response = call(app.clone(), "/status").await;
        assert_eq!(response.status(), StatusCode::OK);
        let status: StatusResponse = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(status.evaluator, "table");
        assert_eq!(status.busy_threshold_ms, 2000);
        assert_eq!(status.outcomes.completed, 1);
        assert_eq!(status.outcomes.failed, 1);

        let response = call(app, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        let text = String::from_utf8(body(response).await.to_vec()).unwrap();
        assert!(text.contains("stategate_state_requests_total{outcome=\"completed\"} 1"));
        assert!(text.contains("stategate_state_requests_total{outcome=\"failed\"} 1"));
    }
}
