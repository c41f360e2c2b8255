//! Router assembly and server loop.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;
use crate::state::AppState;

/// Body-limit slack on top of the raw file size for multipart framing.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.media.max_upload_bytes + BODY_LIMIT_SLACK;

    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route(
            "/api/v1/tests",
            get(routes::tests::list_tests).post(routes::tests::create_test),
        )
        .route(
            "/api/v1/tests/:id",
            get(routes::tests::get_test)
                .patch(routes::tests::patch_test)
                .delete(routes::tests::delete_test),
        )
        .route("/api/v1/tests/slug/check", post(routes::tests::check_slug))
        .route(
            "/api/v1/tests/slug/:slug",
            get(routes::tests::get_test_by_slug),
        )
        .route(
            "/api/v1/tests/slug/:slug/public",
            get(routes::tests::public_test),
        )
        .route(
            "/api/v1/tests/slug/:slug/responses",
            post(routes::telemetry::create_response),
        )
        .route(
            "/api/v1/responses/:id/lead",
            patch(routes::telemetry::patch_lead),
        )
        .route(
            "/api/v1/tests/slug/:slug/events",
            post(routes::telemetry::record_event),
        )
        .route(
            "/api/v1/tests/slug/:slug/runs",
            post(routes::telemetry::record_run),
        )
        .route("/api/v1/stats", get(routes::stats::stats))
        .route("/api/v1/admin/login", post(routes::admin::login))
        .route("/api/v1/admin/tests", get(routes::admin::admin_tests))
        .route(
            "/api/v1/admin/tests/:id/report",
            get(routes::admin::report),
        )
        .route(
            "/api/v1/admin/tests/:id/export",
            get(routes::admin::export),
        )
        .route("/api/v1/media/upload", post(routes::media::upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr();
    let router = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
