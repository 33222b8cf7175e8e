use crate::openapi::META_TAG;
use crate::state::AppState;
use axum::{
    extract::Path,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use http::{header::LOCATION, StatusCode};
use serde_json::json;

/// API home. Existing callers use the exact body as a liveness probe.
#[utoipa::path(
    get,
    path = "/",
    tag = META_TAG,
    responses(
        (status = 200, description = "Service is up")
    )
)]
async fn home() -> impl IntoResponse {
    Json(json!({"message": "API is functional."}))
}

/// Redirect to the ruby bootstrap release asset for an Android architecture
#[utoipa::path(
    get,
    path = "/ruby/{version}/{arch}",
    tag = META_TAG,
    params(
        ("version" = String, Path, description = "Release version"),
        ("arch" = String, Path, description = "Android architecture")
    ),
    responses(
        (status = 302, description = "Redirect to the release asset")
    )
)]
async fn ruby_bootstrap(Path((version, arch)): Path<(String, String)>) -> impl IntoResponse {
    let location = format!(
        "https://github.com/jekyllex/ruby-android/releases/download/{version}/ruby-{arch}"
    );
    // Callers expect the 302 the original service sent, which axum's Redirect
    // helpers do not produce.
    (StatusCode::FOUND, [(LOCATION, location)])
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/ruby/{version}/{arch}", get(ruby_bootstrap))
}
