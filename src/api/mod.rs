pub(crate) mod health;
mod meta;
pub(crate) mod users;

use crate::auth::middleware::authorization_middleware;
use crate::state::AppState;
use axum::{middleware, Router};

/// Combines all API routes into a single router
pub(super) fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(meta::router())
        .merge(health::router())
        .merge(protected_routes(state))
}

/// Routes that sit behind the bearer token gate
fn protected_routes(state: &AppState) -> Router<AppState> {
    users::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        authorization_middleware,
    ))
}
