//! HTTP API under `/students`.
//!
//! [`router`] builds the full axum application; [`serve`] binds it and runs
//! until Ctrl-C.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{CommunicationsQuery, SummaryResponse};

use crate::services::AppContext;
use crate::{Error, Result};
use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use axum::routing::{get, patch, post};
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route(
            "/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/students/",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route("/students/stats", get(handlers::stats))
        .route(
            "/students/{id}",
            get(handlers::get_student).patch(handlers::update_student),
        )
        .route("/students/{id}/internal_notes", patch(handlers::update_notes))
        .route("/students/{id}/tags", patch(handlers::update_tags))
        .route("/students/{id}/email", post(handlers::send_email))
        .route(
            "/students/{id}/communication",
            post(handlers::log_communication),
        )
        .route(
            "/students/{id}/communications",
            get(handlers::communications),
        )
        .route("/students/{id}/ai-summary", get(handlers::ai_summary))
        .route("/students/{id}/engagement", get(handlers::engagement))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(track_requests))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Records request counts and latency per matched route.
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();

    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("http_request_duration_ms", "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64() * 1000.0);
    response
}

/// Serves the API on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(ctx: AppContext, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
