mod handlers;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use sockmap_core::config::TracerConfig;
use sockmap_core::tracer::Tracer;

use openapi::ApiDoc;
use state::{Fs, SharedTracer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "sockmap-web", about = "sockmap tracing API server", version = sockmap_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "SOCKMAP_LISTEN")]
    listen: String,

    /// Path to the /proc filesystem.
    #[arg(long, default_value = "/proc", env = "SOCKMAP_PROC_PATH")]
    proc_path: String,

    /// Whole-trace deadline in seconds; map scans past it are abandoned
    /// and the snapshot is returned as partial.
    #[arg(long, default_value = "30", env = "SOCKMAP_TRACE_DEADLINE")]
    trace_deadline: u64,

    /// Upper bound on concurrent per-process memory map scans.
    #[arg(long, default_value = "8", env = "SOCKMAP_MAP_WORKERS")]
    map_workers: usize,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sockmap_web=info,sockmap_core=info".parse().unwrap()),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    info!(
        version = sockmap_core::VERSION,
        proc_path = %args.proc_path,
        "starting tracer"
    );

    let mut config = TracerConfig::with_proc_path(&args.proc_path)
        .with_deadline(Duration::from_secs(args.trace_deadline));
    config.max_map_workers = args.map_workers.max(1);

    let tracer = Tracer::new(make_fs(), config);
    let state: SharedTracer = Arc::new(Mutex::new(tracer));

    // A full trace gets the long budget; everything else answers in 10s
    // or reports as disconnected.
    let trace_routes = Router::new()
        .route("/api/trace-sockets", get(handlers::handle_trace))
        .layer(TimeoutLayer::new(Duration::from_secs(args.trace_deadline)));
    let quick_routes = Router::new()
        .route("/api/health", get(handlers::handle_health))
        .route("/api/sockets", get(handlers::handle_sockets))
        .route("/api/memory", get(handlers::handle_memory))
        .route("/api/processes", get(handlers::handle_processes))
        .route("/api/config", get(handlers::handle_config))
        .layer(TimeoutLayer::new(handlers::QUICK_ROUTE_BUDGET));

    let app = Router::new()
        .merge(trace_routes)
        .merge(quick_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new());

    let addr: SocketAddr = args.listen.parse().expect("invalid listen address");
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app).await.expect("server error");
}

#[cfg(target_os = "linux")]
fn make_fs() -> Fs {
    sockmap_core::collector::RealFs::new()
}

#[cfg(not(target_os = "linux"))]
fn make_fs() -> Fs {
    sockmap_core::collector::MockFs::typical_system()
}
