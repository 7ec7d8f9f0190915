//! HTTP server: router, shared context and graceful shutdown.

use crate::config::Config;
use crate::conversion::{Orchestrator, StreamRegistry};
use crate::overlays::OverlayGateway;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    middleware,
    routing::get,
    Router,
};
use hlsrelay_av::Transcoder;
use hlsrelay_db::pool::DbPool;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod error;
pub mod request_id;
pub mod routes_convert;
pub mod routes_overlays;
pub mod routes_streams;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub overlays: OverlayGateway,
}

impl AppContext {
    /// Build the context from configuration and an opened overlay store.
    pub fn new(config: Config, db_pool: DbPool) -> Self {
        let program = resolve_engine(&config);
        let transcoder = Transcoder::new(program)
            .with_options(config.transcoder.clone())
            .with_grace_period(config.streams.stop_grace_period());

        let registry = Arc::new(StreamRegistry::new(config.streams.root.clone()));
        let orchestrator = Orchestrator::new(registry, transcoder)
            .with_readiness_timeout(config.streams.readiness_timeout())
            .with_poll_interval(config.streams.poll_interval());

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            overlays: OverlayGateway::new(db_pool),
        }
    }
}

/// Path of the engine executable.
///
/// Resolution failures are logged, not fatal: conversions then fail with a
/// spawn error naming the unresolved program.
fn resolve_engine(config: &Config) -> PathBuf {
    let configured = config.tools.ffmpeg_path.as_deref();
    match hlsrelay_av::resolve_tool("ffmpeg", configured) {
        Ok(path) => {
            tracing::info!("Using ffmpeg at {:?}", path);
            path
        }
        Err(e) => {
            tracing::warn!("{}; conversions will fail until it is installed", e);
            configured
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("ffmpeg"))
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let streams_root = ctx.orchestrator.registry().root().to_path_buf();
    let cors_allow_any = ctx.config.server.cors_allow_any;

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        // Segment files and playlists, one directory per stream
        .nest_service("/streams", ServeDir::new(streams_root))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http());

    let app = if cors_allow_any {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE]),
        )
    } else {
        app
    };

    app.with_state(ctx)
}

fn api_routes() -> Router<AppContext> {
    routes_convert::convert_routes()
        .merge(routes_streams::stream_routes())
        .merge(routes_overlays::overlay_routes())
}

async fn health_check() -> &'static str {
    "ok"
}

/// Serve until a shutdown signal arrives, then stop every running engine.
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    let orchestrator = Arc::clone(&ctx.orchestrator);
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stopped = orchestrator.shutdown().await;
    tracing::info!(stopped, "Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
