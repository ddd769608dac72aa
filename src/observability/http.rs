//! HTTP status page for a running bot.
//!
//! Provides:
//! - `/` - Human-readable summary of the target and connection phase
//! - `/health` - Basic health check
//! - `/metrics` - Prometheus metrics endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::metrics;
use crate::reconnect::ControllerStatus;

/// Status page state.
#[derive(Clone)]
pub struct StatusState {
    pub server: String,
    pub version: String,
    pub status: watch::Receiver<ControllerStatus>,
}

/// Create the status page router.
pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Handle GET / - plain text summary.
async fn index_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let status = *state.status.borrow();
    let body = format!(
        "Your bot is ready!\nServer: {}\nVersion: {}\nPhase: {} (attempt {}/{})\n",
        state.server,
        state.version,
        status.phase,
        status.attempt.attempt_count,
        status.attempt.max_attempts
    );
    (StatusCode::OK, body)
}

/// Handle GET /status - JSON controller status.
async fn status_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let status = *state.status.borrow();
    Json(json!({
        "server": state.server,
        "version": state.version,
        "phase": status.phase,
        "attempt": status.attempt,
    }))
}

/// Handle GET /health - Basic health check.
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Handle GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

/// Bind the status page listener.
///
/// Called before the bot starts so an unusable address fails startup.
pub async fn bind_status_server(addr: SocketAddr) -> Result<TcpListener, std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Web server started");
    Ok(listener)
}

/// Serve the status page on `listener` until `shutdown_rx` changes.
pub async fn serve_status(
    listener: TcpListener,
    state: StatusState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("Web server shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::{ConnectionAttempt, Phase};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(phase: Phase) -> (watch::Sender<ControllerStatus>, StatusState) {
        let (tx, rx) = watch::channel(ControllerStatus {
            phase,
            attempt: ConnectionAttempt::new(5),
        });
        let state = StatusState {
            server: "play.example.net:19132".into(),
            version: "1.21.90".into(),
            status: rx,
        };
        (tx, state)
    }

    #[tokio::test]
    async fn test_index_reports_phase() {
        let (_tx, state) = state(Phase::Connected);
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("play.example.net:19132"));
        assert!(text.contains("Phase: connected"));
    }

    #[tokio::test]
    async fn test_status_json_tracks_watch() {
        let (tx, state) = state(Phase::Connecting);
        let app = create_router(state);
        tx.send_replace(ControllerStatus {
            phase: Phase::Backoff,
            attempt: ConnectionAttempt::new(5),
        });

        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["phase"], "backoff");
        assert_eq!(value["attempt"]["max_attempts"], 5);
    }

    #[tokio::test]
    async fn test_health_and_metrics_endpoints() {
        metrics::init_metrics();
        let (_tx, state) = state(Phase::Idle);
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bind_fails_on_taken_port() {
        let taken = bind_status_server("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = taken.local_addr().unwrap();
        assert!(bind_status_server(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (_tx, state) = state(Phase::Idle);
        let listener = bind_status_server("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(serve_status(listener, state, shutdown_rx));

        shutdown_tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
