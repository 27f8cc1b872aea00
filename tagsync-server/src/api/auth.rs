//! Bearer-token middleware for `/api/*`
//!
//! `/health`, `/events` and `/ws` are mounted outside this layer; the
//! WebSocket endpoint runs its own handshake.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tagsync_common::api::auth::parse_bearer;
use tracing::warn;

use crate::auth::AuthError;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// Reject requests without a known bearer token with 401
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_string);

    let identity = state
        .authenticator
        .authenticate(credential.as_deref())
        .await
        .map_err(|e| {
            warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            match e {
                AuthError::Store(msg) => ApiError::Internal(msg),
                other => ApiError::Unauthorized(other.to_string()),
            }
        })?;

    request.extensions_mut().insert(Identity(identity));
    Ok(next.run(request).await)
}
