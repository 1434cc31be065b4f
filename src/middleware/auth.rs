// SPDX-License-Identifier: MIT

//! Firebase ID token authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated caller extracted from a verified ID token.
///
/// `email_verified` reflects the claim at token mint time; handlers that
/// need the current provider-side value query it explicitly.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    /// The raw bearer token, kept for provider calls made on behalf of
    /// the caller (sending verification email, password change).
    pub id_token: String,
}

/// Middleware that requires a valid Firebase ID token.
///
/// On success the request gains an [`AuthUser`] extension and a detached
/// verification sync is kicked off for the caller, so any pending
/// provider-side verification eventually lands in the profile store
/// without adding request latency.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request.headers().get(header::AUTHORIZATION);
    let identity = state.verifier.verify_bearer(auth_header).await?;

    let id_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();

    state.sync.spawn_reconcile(&identity.uid);

    let auth_user = AuthUser {
        uid: identity.uid,
        email: identity.email,
        email_verified: identity.email_verified,
        id_token,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
