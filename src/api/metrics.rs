//! Prometheus metrics
//!
//! Exposes outcome counters in Prometheus text format at `/metrics`.
//!
//! ## Metrics Exposed
//!
//! - `stategate_state_requests_total{outcome}` - State reads by reply (completed, busy, failed)
//! - `stategate_late_evaluations_total{outcome}` - Evaluations that finished after a busy reply
//! - `stategate_late_evaluations_pending` - Busy replies whose evaluation has not finished
//! - `stategate_busy_threshold_seconds` - Configured busy threshold
//! - `stategate_uptime_seconds` - Time since the server started

use axum::{extract::State, http::header, response::IntoResponse};

use super::state::ApiState;
use crate::snapshot::OutcomeSnapshot;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Generate Prometheus-format metrics
pub async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let output = render_metrics(
        &state.stats().snapshot(),
        state.gate().threshold().as_secs_f64(),
    );
    ([(header::CONTENT_TYPE, TEXT_FORMAT)], output)
}

fn render_metrics(stats: &OutcomeSnapshot, threshold_secs: f64) -> String {
    let mut output = String::new();

    family(
        &mut output,
        "stategate_info",
        "Stategate build information",
        "gauge",
        &[(format!("version=\"{}\"", env!("CARGO_PKG_VERSION")), "1".to_string())],
    );

    family(
        &mut output,
        "stategate_state_requests_total",
        "State reads by reply",
        "counter",
        &[
            ("outcome=\"completed\"".to_string(), stats.completed.to_string()),
            ("outcome=\"busy\"".to_string(), stats.busy.to_string()),
            ("outcome=\"failed\"".to_string(), stats.failed.to_string()),
        ],
    );

    family(
        &mut output,
        "stategate_late_evaluations_total",
        "Evaluations that finished after a busy reply",
        "counter",
        &[
            ("outcome=\"completed\"".to_string(), stats.late_completed.to_string()),
            ("outcome=\"failed\"".to_string(), stats.late_failed.to_string()),
        ],
    );

    family(
        &mut output,
        "stategate_late_evaluations_pending",
        "Busy replies whose evaluation has not finished",
        "gauge",
        &[(String::new(), stats.detached_pending().to_string())],
    );

    family(
        &mut output,
        "stategate_busy_threshold_seconds",
        "Configured busy threshold",
        "gauge",
        &[(String::new(), format!("{threshold_secs:.3}"))],
    );

    family(
        &mut output,
        "stategate_uptime_seconds",
        "Time since the server started",
        "gauge",
        &[(String::new(), format!("{:.3}", stats.uptime_ms as f64 / 1000.0))],
    );

    output
}

/// Append one metric family; empty labels render a bare sample
fn family(output: &mut String, name: &str, help: &str, kind: &str, samples: &[(String, String)]) {
    output.push_str(&format!("# HELP {name} {help}\n# TYPE {name} {kind}\n"));
    for (labels, value) in samples {
        if labels.is_empty() {
            output.push_str(&format!("{name} {value}\n"));
        } else {
            output.push_str(&format!("{name}{{{labels}}} {value}\n"));
        }
    }
    output.push('\n');
}
