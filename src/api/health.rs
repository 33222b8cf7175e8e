use crate::openapi::HEALTH_TAG;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Basic health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_held: Option<bool>,
    #[serde(skip)]
    status_code: StatusCode,
}

impl IntoResponse for Health {
    fn into_response(self) -> Response {
        let status_code = self.status_code;
        (status_code, Json(self)).into_response()
    }
}

/// Basic health check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is healthy", body = Health)
    )
)]
async fn health_check() -> impl IntoResponse {
    Health {
        status: "ok",
        credential_held: None,
        status_code: StatusCode::OK,
    }
}

/// Readiness check handler. The service is degraded while it holds no
/// management API credential: lookups would fail until a fetch succeeds.
#[utoipa::path(
    get,
    path = "/ready",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service holds a management credential", body = Health),
        (status = 503, description = "No management credential held", body = Health)
    )
)]
async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let held = state.token_manager.credential().await.is_some();
    Health {
        status: if held { "ok" } else { "degraded" },
        credential_held: Some(held),
        status_code: if held {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        },
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
}
