//! Application startup and lifecycle management.

use crate::config::Config;
use crate::handlers;
use crate::services::billing::BillingEngine;
use crate::services::database::Database;
use crate::services::metrics::get_metrics;
use crate::services::mikrotik::MikrotikClient;
use axum::{
    http::StatusCode,
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: BillingEngine,
    pub config: Config,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "subscriber-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint. Verifies the database is reachable.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.db.health_check().await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ready" }))))
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;

        let mikrotik = MikrotikClient::new(config.mikrotik.clone())?;
        if mikrotik.is_configured() {
            tracing::info!("MikroTik client initialized");
        } else {
            tracing::warn!(
                "MikroTik integration not configured - router commands will stay pending"
            );
        }

        let engine = BillingEngine::new(db.clone(), mikrotik, config.billing.clone())?;

        let state = AppState {
            db,
            engine,
            config: config.clone(),
        };

        // Port 0 = random port for testing
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Subscriber service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .await
            .map_err(|e| std::io::Error::other(format!("HTTP server error: {}", e)))
    }
}

/// Build the full HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .route(
            "/customers/:id/odp/attach",
            post(handlers::customers::attach_odp),
        )
        .route(
            "/customers/:id/odp/move",
            post(handlers::customers::move_odp),
        )
        .route(
            "/customers/:id/odp/detach",
            post(handlers::customers::detach_odp),
        )
        .route(
            "/customers/:id/transactions",
            get(handlers::customers::list_transactions),
        )
        .route(
            "/customers/:id/addons",
            get(handlers::addons::list_addons).post(handlers::addons::create_addon),
        )
        .route(
            "/addons/:id",
            put(handlers::addons::update_addon).delete(handlers::addons::deactivate_addon),
        )
        .route(
            "/odps",
            get(handlers::odps::list_odps).post(handlers::odps::create_odp),
        )
        .route("/odps/:id", get(handlers::odps::get_odp))
        .route(
            "/routers",
            get(handlers::routers::list_routers).post(handlers::routers::create_router),
        )
        .route(
            "/billing/calculate-prorata",
            post(handlers::billing::calculate_prorata_handler),
        )
        .route(
            "/billing/generate-monthly-bills",
            post(handlers::billing::generate_monthly_bills),
        )
        .route(
            "/billing/suspend-overdue",
            post(handlers::billing::suspend_overdue),
        )
        .route(
            "/billing/retry-router-commands",
            post(handlers::billing::retry_router_commands),
        )
        .route("/dashboard/summary", get(handlers::dashboard::summary))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
