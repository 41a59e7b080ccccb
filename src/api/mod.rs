use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};

use crate::adb::{AdbClient, CommandRunner};
use crate::collector::{samplers::SamplerCtx, CollectorHub};
use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::gauges::GaugeBoard;

pub mod devices;
pub mod error;
pub mod metrics;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub gauges: Arc<GaugeBoard>,
    pub hub: Arc<CollectorHub>,
}

impl AppState {
    /// Build state around the real adb transport.
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(AdbClient::new(&config.adb_bin));
        Self::with_runner(pool, config, runner)
    }

    /// Build state around an arbitrary transport (used by tests).
    pub fn with_runner(
        pool: SqlitePool,
        config: AppConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let gauges = Arc::new(GaugeBoard::new());
        let ctx = SamplerCtx {
            runner: runner.clone(),
            store: Arc::new(SqliteStore::new(pool.clone())),
            gauges: gauges.clone(),
            app_package: config.app_package.clone(),
        };
        let hub = CollectorHub::new(ctx, Duration::from_secs(config.sample_interval_secs));

        Self {
            db: pool,
            config,
            runner,
            gauges,
            hub,
        }
    }
}

/// Build the main application router with all API routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health))
        // Device handshake + info
        .route("/devices/connect", post(devices::connect))
        .route("/devices/disconnect", post(devices::disconnect))
        .route("/devices/:ip/info", get(devices::info))
        // Test dispatch + collection lifecycle
        .route("/tests/run", post(tests::run))
        .route("/tests/stop", post(tests::stop))
        .route("/tests/active", get(tests::active))
        // Historical sample readback
        .route("/samples/:kind", get(tests::samples));

    Router::new()
        .nest("/api/v1", api_v1)
        // Prometheus scrape endpoint, outside the API prefix.
        .route("/metrics", get(metrics::handler))
        .layer(cors)
        .with_state(state)
}

/// Simple health check endpoint.
async fn health() -> &'static str {
    "ok"
}
