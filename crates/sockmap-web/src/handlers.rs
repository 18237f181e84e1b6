//! HTTP request handlers for the tracing API.
//!
//! Every endpoint that touches the tracer runs it on the blocking thread
//! pool: a trace walks hundreds of `/proc` files and would stall the
//! async workers otherwise. The tracer mutex serializes traces, so
//! concurrent requests queue rather than race the classifier history.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use sockmap_core::model::TraceSnapshot;
use sockmap_core::tracer::TraceError;

use crate::state::AppState;

/// Response budget for every route except the full trace. Traces run for
/// these routes are capped to this budget so they degrade to a partial
/// snapshot instead of hitting the route timeout.
pub(crate) const QUICK_ROUTE_BUDGET: Duration = Duration::from_secs(10);

/// Health report for the tracing backend.
#[derive(Serialize, utoipa::ToSchema)]
pub(crate) struct HealthResponse {
    /// "ok" when the socket table is readable, "degraded" otherwise.
    status: &'static str,
    /// Whether the kernel socket table can be enumerated right now.
    binary_exists: bool,
    /// The proc root being scanned.
    binary_path: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Tracing backend health", body = HealthResponse)
    )
)]
pub(crate) async fn handle_health(
    axum::extract::State(state): AppState,
) -> Result<Json<HealthResponse>, StatusCode> {
    // A trace in flight holds the tracer mutex for seconds; wait for it
    // off the async workers so the route timeout can still fire.
    let health = tokio::task::spawn_blocking(move || state.lock().unwrap().health_check())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(HealthResponse {
        status: if health.socket_table_readable {
            "ok"
        } else {
            "degraded"
        },
        binary_exists: health.socket_table_readable,
        binary_path: health.proc_path,
    }))
}

#[utoipa::path(
    get,
    path = "/api/trace-sockets",
    responses(
        (status = 200, description = "Full trace snapshot", body = TraceSnapshot),
        (status = 500, description = "Trace failed; body carries an error field")
    )
)]
pub(crate) async fn handle_trace(
    axum::extract::State(state): AppState,
) -> Result<Json<TraceSnapshot>, (StatusCode, Json<Value>)> {
    let snapshot = run_trace(state, None).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/api/sockets",
    responses(
        (status = 200, description = "Socket records from a fresh trace"),
        (status = 500, description = "Trace failed; body carries an error field")
    )
)]
pub(crate) async fn handle_sockets(
    axum::extract::State(state): AppState,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let snapshot = run_trace(state, Some(QUICK_ROUTE_BUDGET)).await?;
    Ok(Json(json!({
        "sockets": snapshot.sockets,
        "timestamp": snapshot.timestamp,
        "soft_errors": snapshot.soft_errors,
        "partial": snapshot.partial,
    })))
}

#[utoipa::path(
    get,
    path = "/api/memory",
    responses(
        (status = 200, description = "Memory segments from a fresh trace"),
        (status = 500, description = "Trace failed; body carries an error field")
    )
)]
pub(crate) async fn handle_memory(
    axum::extract::State(state): AppState,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let snapshot = run_trace(state, Some(QUICK_ROUTE_BUDGET)).await?;
    Ok(Json(json!({
        "memory": snapshot.memory,
        "timestamp": snapshot.timestamp,
        "soft_errors": snapshot.soft_errors,
        "partial": snapshot.partial,
    })))
}

#[utoipa::path(
    get,
    path = "/api/processes",
    responses(
        (status = 200, description = "Process summaries from a fresh trace"),
        (status = 500, description = "Trace failed; body carries an error field")
    )
)]
pub(crate) async fn handle_processes(
    axum::extract::State(state): AppState,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let snapshot = run_trace(state, Some(QUICK_ROUTE_BUDGET)).await?;
    Ok(Json(json!({
        "processes": snapshot.processes,
        "timestamp": snapshot.timestamp,
        "soft_errors": snapshot.soft_errors,
        "partial": snapshot.partial,
    })))
}

#[utoipa::path(
    get,
    path = "/api/config",
    responses(
        (status = 200, description = "Active tracer thresholds and limits", body = sockmap_core::config::TracerConfig)
    )
)]
pub(crate) async fn handle_config(
    axum::extract::State(state): AppState,
) -> Result<Json<Value>, StatusCode> {
    let config = tokio::task::spawn_blocking(move || state.lock().unwrap().config().clone())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::to_value(config).unwrap_or_else(|_| json!({}))))
}

/// Runs one trace on the blocking pool and maps failures to a 500 with
/// the empty-collections error body clients expect. A `budget` tightens
/// the trace deadline below the configured one.
async fn run_trace(
    state: crate::state::SharedTracer,
    budget: Option<Duration>,
) -> Result<TraceSnapshot, (StatusCode, Json<Value>)> {
    let result = tokio::task::spawn_blocking(move || {
        let mut tracer = state.lock().unwrap();
        match budget {
            Some(budget) => {
                let budget = budget.min(tracer.config().trace_deadline);
                tracer.trace_with_deadline(budget)
            }
            None => tracer.trace(),
        }
    })
    .await
    .map_err(|e| {
        error!(error = %e, "trace task panicked");
        trace_error_body("trace task failed")
    })?;

    result.map_err(|e: TraceError| {
        error!(error = %e, "trace failed");
        trace_error_body(&e.to_string())
    })
}

fn trace_error_body(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "sockets": [],
            "memory": [],
            "processes": [],
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use sockmap_core::config::TracerConfig;
    use sockmap_core::tracer::Tracer;

    use crate::state::{Fs, SharedTracer};

    #[cfg(target_os = "linux")]
    fn test_fs() -> Fs {
        sockmap_core::collector::RealFs::new()
    }

    #[cfg(not(target_os = "linux"))]
    fn test_fs() -> Fs {
        sockmap_core::collector::MockFs::typical_system()
    }

    fn shared_tracer() -> SharedTracer {
        Arc::new(Mutex::new(Tracer::new(test_fs(), TracerConfig::default())))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn health_yields_while_a_trace_holds_the_tracer() {
        let state = shared_tracer();
        // Hold the tracer the way an in-flight trace does
        let _guard = state.lock().unwrap();

        // The handler must park on the blocking pool, not inside poll, so
        // a timeout wrapping it can still fire
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            handle_health(axum::extract::State(state.clone())),
        )
        .await;
        assert!(
            result.is_err(),
            "health must not complete while the tracer is locked"
        );
    }

    #[tokio::test]
    async fn quick_route_budget_caps_the_trace_deadline() {
        let state = shared_tracer();
        let snapshot = run_trace(state, Some(Duration::ZERO)).await.unwrap();
        assert!(snapshot.partial);
        assert!(snapshot.memory.is_empty());
    }

    #[tokio::test]
    async fn full_trace_runs_under_the_configured_deadline() {
        let state = shared_tracer();
        let snapshot = run_trace(state, None).await.unwrap();
        assert!(!snapshot.partial);
    }
}
