// SPDX-License-Identifier: MIT

//! Routes for authenticated users: profile access, verification sync and
//! account management.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::routes::auth::MessageResponse;
use crate::AppState;

/// Routes that require authentication; the middleware is applied in
/// routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(get_me).delete(delete_account))
        .route("/auth/user/{user_id}", get(get_user))
        .route("/auth/verify-token", get(verify_token))
        .route("/auth/verify-email", post(send_verification_email))
        .route("/auth/sync-verification", post(sync_verification))
        .route("/auth/password-update", post(update_password))
        .route("/auth/admin/verify-email/{email}", post(admin_verify_email))
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UserResponse {
    pub uid: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<crate::models::UserProfile> for UserResponse {
    fn from(p: crate::models::UserProfile) -> Self {
        Self {
            uid: p.firebase_uid,
            username: p.username,
            email: p.email,
            first_name: p.first_name,
            last_name: p.last_name,
            email_verified: p.email_verified,
            is_active: p.is_active,
            created_at: p.created_at,
            last_login: p.last_login,
        }
    }
}

/// Get the caller's profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    profile_response(&state, &user.uid).await
}

/// Get another user's profile by UID.
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>> {
    profile_response(&state, &user_id).await
}

/// Build a profile response with the freshest verification flag we can
/// get: a reconcile gives the provider's answer and updates the mirror
/// as a side effect; if the provider is down we fall back to the mirror.
async fn profile_response(state: &AppState, uid: &str) -> Result<Json<UserResponse>> {
    let fresh_flag = match state.sync.reconcile(uid).await {
        Ok(verified) => Some(verified),
        Err(e) => {
            tracing::warn!(error = %e, uid, "Falling back to mirrored verification flag");
            None
        }
    };

    let profile = state
        .db
        .get_user(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

    let mut response: UserResponse = profile.into();
    if let Some(verified) = fresh_flag {
        response.email_verified = verified;
    }

    Ok(Json(response))
}

// ─── Token Introspection ─────────────────────────────────────

#[derive(Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

/// Confirm the bearer token is valid and report its claims.
///
/// Reaching this handler already means the middleware accepted the
/// token, so this just echoes the verified identity back.
async fn verify_token(Extension(user): Extension<AuthUser>) -> Json<VerifyTokenResponse> {
    Json(VerifyTokenResponse {
        valid: true,
        uid: user.uid,
        email: user.email,
        email_verified: user.email_verified,
    })
}

// ─── Email Verification ──────────────────────────────────────

/// Re-send the verification email for the calling account.
async fn send_verification_email(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>> {
    state
        .firebase
        .send_verification_email(&user.id_token)
        .await?;

    tracing::info!(uid = %user.uid, "Verification email re-sent");

    Ok(Json(MessageResponse {
        message: "Verification email sent. Please check your inbox.".to_string(),
    }))
}

#[derive(Serialize)]
pub struct SyncVerificationResponse {
    pub email_verified: bool,
    pub message: String,
}

/// Explicitly reconcile the caller's verification status.
///
/// Unlike the passive request-time sync, failures here surface to the
/// caller so a user stuck unverified gets a diagnosable error instead
/// of silence.
async fn sync_verification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncVerificationResponse>> {
    let verified = state.sync.reconcile(&user.uid).await?;

    Ok(Json(SyncVerificationResponse {
        email_verified: verified,
        message: format!(
            "Email verification status synced. Email is {}.",
            if verified { "verified" } else { "not verified" }
        ),
    }))
}

// ─── Password Update ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct PasswordUpdateRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Change the caller's password after re-checking the current one.
async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PasswordUpdateRequest>,
) -> Result<Json<MessageResponse>> {
    let email = match &user.email {
        Some(email) => email.clone(),
        None => {
            let profile = state
                .db
                .get_user(&user.uid)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;
            profile.email
        }
    };

    // Re-authenticate with the current password before changing it.
    if let Err(e) = state
        .firebase
        .sign_in(&email, &payload.current_password)
        .await
    {
        return match e {
            AppError::InvalidCredentials(_) => {
                Err(AppError::BadRequest("Current password is incorrect".to_string()))
            }
            other => Err(other),
        };
    }

    state
        .firebase
        .update_password(&user.id_token, &payload.new_password)
        .await?;

    tracing::info!(uid = %user.uid, "Password updated");

    Ok(Json(MessageResponse {
        message: "Password updated successfully.".to_string(),
    }))
}

// ─── Administrative Override ─────────────────────────────────

/// Force-verify an account by email without an oob code.
///
/// Development escape hatch for emulator environments where no real
/// email is delivered; refuses to run against production endpoints.
async fn admin_verify_email(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<MessageResponse>> {
    if std::env::var("FIREBASE_AUTH_EMULATOR_HOST").is_err() {
        return Err(AppError::NotFound("Not available".to_string()));
    }

    let profile = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No user with email {}", email)))?;

    state
        .firebase
        .set_verified_admin(&profile.firebase_uid)
        .await?;
    state.sync.reconcile(&profile.firebase_uid).await?;

    tracing::warn!(email = %email, "Email force-verified via admin endpoint");

    Ok(Json(MessageResponse {
        message: format!("Email {} marked as verified", email),
    }))
}

// ─── Account Deletion ────────────────────────────────────────

/// Delete the calling account at the provider and locally.
///
/// Requires a verified email so a typo'd registration cannot be used to
/// delete someone's account before they ever see it.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>> {
    let account = state.firebase.lookup_by_token(&user.id_token).await?;
    if !account.email_verified {
        return Err(AppError::EmailNotVerified);
    }

    state.firebase.delete_account(&user.id_token).await?;
    state.db.delete_user(&user.uid).await?;

    tracing::info!(uid = %user.uid, "Account deleted");

    Ok(Json(MessageResponse {
        message: "Account deleted.".to_string(),
    }))
}
