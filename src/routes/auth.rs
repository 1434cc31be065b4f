// SPDX-License-Identifier: MIT

//! Public authentication routes: registration, login, token refresh and
//! password reset requests.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::UserProfile;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/password-reset", post(request_password_reset))
}

/// Generic message response.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ─── Registration ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 3, max = 30), custom(function = validate_username))]
    pub username: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

fn validate_username(username: &str) -> std::result::Result<(), validator::ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("username_charset")
            .with_message("username must contain only letters, digits and underscores".into()))
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub uid: String,
    pub email: String,
    pub username: String,
    pub email_verified: bool,
    pub message: String,
}

/// Register a new account.
///
/// Creates the provider-side account first, then the local profile with
/// `email_verified = false`. If the profile insert fails, the provider
/// account is rolled back so the email address is not left orphaned.
/// A verification email is sent best-effort at the end.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let username = payload.username.to_lowercase();

    // Usernames are ours, not the provider's; enforce uniqueness here.
    if state.db.get_user_by_username(&username).await?.is_some() {
        return Err(AppError::UsernameExists);
    }

    let tokens = state
        .firebase
        .sign_up(&payload.email, &payload.password)
        .await?;

    let display_name = format!("{} {}", payload.first_name, payload.last_name);
    if let Err(e) = state
        .firebase
        .set_display_name(&tokens.id_token, &display_name)
        .await
    {
        tracing::warn!(error = %e, uid = %tokens.local_id, "Failed to set display name");
    }

    let profile = UserProfile {
        firebase_uid: tokens.local_id.clone(),
        username: username.clone(),
        email: payload.email.clone(),
        first_name: payload.first_name,
        last_name: payload.last_name,
        email_verified: false,
        is_active: true,
        created_at: chrono::Utc::now().to_rfc3339(),
        last_login: None,
    };

    if let Err(e) = state.db.upsert_user(&profile).await {
        // Roll back the provider account so registration can be retried.
        tracing::error!(error = %e, uid = %tokens.local_id, "Profile insert failed, rolling back provider account");
        if let Err(rollback_err) = state.firebase.delete_account(&tokens.id_token).await {
            tracing::error!(
                error = %rollback_err,
                uid = %tokens.local_id,
                "Rollback of provider account failed, manual cleanup needed"
            );
        }
        return Err(e);
    }

    if let Err(e) = state
        .firebase
        .send_verification_email(&tokens.id_token)
        .await
    {
        tracing::warn!(error = %e, uid = %tokens.local_id, "Failed to send verification email");
    }

    tracing::info!(uid = %tokens.local_id, username = %username, "New account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            uid: tokens.local_id,
            email: payload.email,
            username,
            email_verified: false,
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
        }),
    ))
}

// ─── Login ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub email_verified: bool,
}

/// Email/password login.
///
/// The `email_verified` flag in the response is read from the provider
/// after sign-in, never from the local mirror, so a user who just
/// clicked their verification link sees the change immediately. The
/// local mirror is reconciled in the same step.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let tokens = state
        .firebase
        .sign_in(&payload.email, &payload.password)
        .await?;

    let account = state.firebase.lookup_by_token(&tokens.id_token).await?;

    if account.disabled {
        return Err(AppError::AccountDisabled);
    }

    // Mirror maintenance piggybacks on the authoritative read we already
    // have. One combined write covers both the login timestamp and the
    // verification latch; a store failure must not fail the login.
    if let Err(e) = state
        .db
        .record_login(&tokens.local_id, account.email_verified)
        .await
    {
        tracing::warn!(error = %e, uid = %tokens.local_id, "Failed to record login");
    }

    tracing::info!(uid = %tokens.local_id, "User logged in");

    Ok(Json(LoginResponse {
        uid: tokens.local_id,
        id_token: tokens.id_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        email_verified: account.email_verified,
    }))
}

// ─── Token Refresh ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub email_verified: bool,
}

/// Exchange a refresh token for a fresh ID token.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let refreshed = state.firebase.refresh_tokens(&payload.refresh_token).await?;
    let account = state.firebase.lookup_by_token(&refreshed.id_token).await?;

    if account.disabled {
        return Err(AppError::AccountDisabled);
    }

    Ok(Json(RefreshResponse {
        uid: refreshed.user_id,
        id_token: refreshed.id_token,
        refresh_token: refreshed.refresh_token,
        expires_in: refreshed.expires_in,
        email_verified: account.email_verified,
    }))
}

// ─── Password Reset Request ──────────────────────────────────

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Request a password reset email.
///
/// Always responds with the same message so the endpoint cannot be used
/// to discover which addresses have accounts.
async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>> {
    match state.firebase.send_password_reset(&payload.email).await {
        Ok(()) => {}
        Err(AppError::InvalidCredentials(_)) | Err(AppError::NotFound(_)) => {
            tracing::debug!(email = %payload.email, "Password reset for unknown email");
        }
        Err(e) => return Err(e),
    }

    Ok(Json(MessageResponse {
        message: "If an account exists for this email, a password reset link has been sent."
            .to_string(),
    }))
}
