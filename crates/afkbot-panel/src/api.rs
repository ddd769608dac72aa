//! HTTP API over the session registry.
//!
//! The caller is identified by the `x-user-id` header. Every route except
//! `/health` and `/metrics` requires it.

use afkbot::error::RegistryError;
use afkbot::observability::http::{health_handler, metrics_handler};
use afkbot::registry::{EditionChoice, SessionRegistry};
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Header carrying the caller id.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
}

#[derive(Debug, Deserialize)]
pub struct AddServerRequest {
    /// `host[:port]`
    pub address: String,
    #[serde(default)]
    pub edition: EditionChoice,
}

/// Caller id taken from [`USER_HEADER`].
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
            .ok_or(ApiError::MissingCaller)
    }
}

/// Error body `{"error": ...}` with a status derived from the failure.
#[derive(Debug)]
pub enum ApiError {
    MissingCaller,
    Registry(RegistryError),
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingCaller => (StatusCode::UNAUTHORIZED, format!("missing {USER_HEADER} header")),
            Self::Registry(e) => {
                let status = match &e {
                    RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                    RegistryError::NotAuthorized(_) | RegistryError::AdminOnly => StatusCode::FORBIDDEN,
                    RegistryError::AlreadyRunning(_)
                    | RegistryError::NotRunning(_)
                    | RegistryError::LimitReached { .. } => StatusCode::CONFLICT,
                    RegistryError::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
                    RegistryError::Store(store) => {
                        tracing::error!(error = %store, "Registry store failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/servers", get(list_servers).post(add_server))
        .route("/api/servers/{id}", get(get_server).delete(remove_server))
        .route("/api/servers/{id}/start", post(start_server))
        .route("/api/servers/{id}/stop", post(stop_server))
        .route("/api/stats", get(stats))
        .with_state(state)
}

async fn list_servers(State(state): State<AppState>, Caller(caller): Caller) -> impl IntoResponse {
    Json(state.registry.list(&caller))
}

async fn add_server(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<AddServerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.registry.register(&caller, &req.address, req.edition)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_server(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry.status(&caller, &id)?))
}

async fn remove_server(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry.remove(&caller, &id)?))
}

async fn start_server(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok((StatusCode::ACCEPTED, Json(state.registry.start(&caller, &id)?)))
}

async fn stop_server(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry.stop(&caller, &id)?))
}

async fn stats(State(state): State<AppState>, Caller(caller): Caller) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry.stats(&caller)?))
}
