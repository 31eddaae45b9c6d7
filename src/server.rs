//! HTTP server setup and initialization

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, RawQuery, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::handler::{
    StatsError, StatsHandler, StatsQuery, StatsRequest, StatsResponse, MAX_BODY_BYTES,
};

/// Route serving the stats API (every method goes to the handler)
pub const STATS_ROUTE: &str = "/api/stats";

/// Build the router
pub fn router(handler: StatsHandler) -> Router {
    Router::new()
        .route(STATS_ROUTE, any(stats_endpoint))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Any method on /api/stats
///
/// The handler does synchronous file I/O, so it runs on the blocking pool.
/// Body rejections are answered here so they still get the JSON error shape.
async fn stats_endpoint(
    State(handler): State<StatsHandler>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(
                method = %method,
                error = %rejection.body_text(),
                "Request body rejected"
            );
            let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                StatsError::body_too_large()
            } else {
                StatsError::Rejected {
                    status: rejection.status(),
                    message: rejection.body_text(),
                }
            };
            return StatsResponse::from(err).into_response();
        }
    };

    let request = StatsRequest {
        method,
        query: StatsQuery::parse(query.as_deref()),
        body,
    };

    match tokio::task::spawn_blocking(move || handler.handle(request)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!("Stats handler task failed: {}", e);
            StatsResponse::from(StatsError::Storage(format!("Handler failed: {}", e)))
                .into_response()
        }
    }
}

/// Start the HTTP server and run until `shutdown_rx` fires
pub async fn start_server(
    bind_addr: SocketAddr,
    handler: StatsHandler,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let app = router(handler);

    tracing::info!("Starting stats server on {}", bind_addr);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Stats server listening on {}", bind_addr);

    // Start serving requests with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    tracing::info!("Stats server shut down gracefully");
    Ok(())
}
