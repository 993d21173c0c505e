//! State HTTP API
//!
//! Serves evaluated process memory behind a busy threshold.
//!
//! ## Endpoints
//!
//! - `GET /state/{process_id}?to=` - Process memory, or `202` while evaluation runs
//! - `GET /health` - Health check (always returns 200 if running)
//! - `GET /status` - Outcome counters
//! - `GET /metrics` - Prometheus metrics

mod error;
mod metrics;
mod restriction;
mod server;
mod state;

pub use error::{ApiError, ErrorBody};
pub use restriction::{ProcessGuard, restrict_processes};
pub use server::{StateQuery, create_router, start_api_server};
pub use state::{ApiState, HealthResponse, StatusResponse};
