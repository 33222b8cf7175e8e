//! The proxied user lookup.

use crate::openapi::USERS_TAG;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::{header::CONTENT_TYPE, StatusCode};
use log::{debug, error};
use serde_json::json;

/// Look up a user record on the upstream management API.
///
/// The upstream body is relayed verbatim on success. Failures are relayed as
/// a 200 response carrying a `message` field; existing callers of the
/// original service depend on that shape, so this is deliberate.
#[utoipa::path(
    get,
    path = "/user/{id}",
    tag = USERS_TAG,
    params(
        ("id" = String, Path, description = "User id to look up")
    ),
    responses(
        (status = 200, description = "Upstream user record, or an error message"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the read:userdata permission")
    )
)]
async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // The credential is empty right after startup and after a failed refresh.
    // Waiting for the fetch here means the first caller still gets an answer.
    let token = match state.token_manager.access_token().await {
        Some(token) => token,
        None => {
            state.token_manager.ensure_token().await;
            match state.token_manager.access_token().await {
                Some(token) => token,
                None => {
                    error!("No management API credential available for user lookup");
                    return error_message("management API credential unavailable");
                }
            }
        }
    };

    let url = state.config.auth0.user_url(&id);
    debug!("Forwarding user lookup to {}", url);

    let response = match state
        .management_client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!("User lookup request failed: {}", e);
            return error_message(&e.to_string());
        }
    };

    let status = response.status();
    if !status.is_success() {
        error!("User lookup returned {}", status);
        return error_message(&format!(
            "request failed with status code {}",
            status.as_u16()
        ));
    }

    match response.bytes().await {
        Ok(bytes) => {
            (StatusCode::OK, [(CONTENT_TYPE, "application/json")], bytes).into_response()
        }
        Err(e) => {
            error!("Failed to read user lookup response: {}", e);
            error_message(&e.to_string())
        }
    }
}

/// Error shape of the original service: always status 200, `message` field.
fn error_message(detail: &str) -> Response {
    (StatusCode::OK, Json(json!({ "message": detail }))).into_response()
}

pub(super) fn router() -> Router<AppState> {
    Router::new().route("/user/{id}", get(get_user))
}
