use crate::auth::{AuthError, TokenClaims, READ_USERDATA};
use crate::errors::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use log::warn;

/// Authorization gate in front of the proxy route.
///
/// Runs the full verification sequence before the handler is entered: bearer
/// extraction, key resolution, signature, issuer, audience, and the
/// `read:userdata` permission. Rejected requests never reach the handler; on
/// success the decoded claims are attached to the request extensions.
pub(crate) async fn authorization_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let claims = match verify_request(&state, request.headers()).await {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Rejected request to {}: {}", request.uri().path(), e);
            return ApiError::from(e).into_response();
        }
    };
    request.extensions_mut().insert(claims);
    next.run(request).await
}

async fn verify_request(
    state: &AppState,
    headers: &http::HeaderMap,
) -> Result<TokenClaims, AuthError> {
    let token = bearer_token(headers)?;

    let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    if header.alg != Algorithm::RS256 {
        return Err(AuthError::InvalidToken(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }
    let kid = header
        .kid
        .ok_or_else(|| AuthError::InvalidToken("token has no key id".to_string()))?;

    let key = state.key_store.decoding_key(&kid).await?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[&state.config.auth0.api_audience]);
    validation.set_issuer(&[state.config.auth0.issuer()]);
    let data = decode::<TokenClaims>(token, &key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    if !data.claims.has_permission(READ_USERDATA) {
        return Err(AuthError::InsufficientScope);
    }

    Ok(data.claims)
}

/// Extract the token from the `Authorization: Bearer <token>` header.
fn bearer_token(headers: &http::HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;
    let header = header.to_str().map_err(|_| AuthError::MalformedHeader)?;

    // The scheme is case-insensitive, the token is not.
    let is_bearer = header
        .get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer "));
    if !is_bearer {
        return Err(AuthError::MalformedHeader);
    }
    Ok(header[7..].trim())
}
