// SPDX-License-Identifier: MIT

//! Handlers for links in provider-sent emails.
//!
//! Firebase emails point the user's browser at these routes with an
//! out-of-band (oob) code in the query string. Verification codes are
//! applied immediately; password reset codes either redirect to the
//! configured frontend page or fall back to a minimal built-in form.

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/verify-email-callback", get(handle_email_action))
        .route("/auth/reset-password-confirm", post(confirm_password_reset))
}

/// Query parameters Firebase puts on email action links.
#[derive(Deserialize)]
pub struct EmailActionParams {
    pub mode: String,
    #[serde(rename = "oobCode")]
    pub oob_code: String,
}

/// Dispatch on the action mode from the email link.
async fn handle_email_action(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EmailActionParams>,
) -> Response {
    match params.mode.as_str() {
        "verifyEmail" => handle_verify_email(state, &params.oob_code).await,
        "resetPassword" => handle_reset_password(state, &params.oob_code).await,
        other => {
            tracing::warn!(mode = %other, "Unknown email action mode");
            (
                StatusCode::BAD_REQUEST,
                error_page("Unknown action", "This link is not recognized."),
            )
                .into_response()
        }
    }
}

/// Apply a verification oob code and show (or redirect to) a result page.
///
/// The provider-side flag flips first; the local mirror is then
/// reconciled best-effort. Even if the mirror write fails the user sees
/// success, because their email really is verified now and the mirror
/// will catch up on their next authenticated request.
async fn handle_verify_email(state: Arc<AppState>, oob_code: &str) -> Response {
    let confirmation = match state.firebase.confirm_verification(oob_code).await {
        Ok(c) => c,
        Err(AppError::InvalidOobCode(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                error_page(
                    "Link expired",
                    "This verification link is invalid or has expired. Please request a new one.",
                ),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Verification confirmation failed");
            return (
                StatusCode::BAD_GATEWAY,
                error_page("Something went wrong", "Please try again later."),
            )
                .into_response();
        }
    };

    let uid = match (&confirmation.local_id, &confirmation.email) {
        (Some(uid), _) => Some(uid.clone()),
        (None, Some(email)) => match state.db.get_user_by_email(email).await {
            Ok(profile) => profile.map(|p| p.firebase_uid),
            Err(e) => {
                tracing::warn!(error = %e, "Profile lookup by email failed after verification");
                None
            }
        },
        (None, None) => None,
    };

    match uid {
        Some(uid) => {
            if let Err(e) = state.db.set_email_verified(&uid).await {
                tracing::warn!(error = %e, uid = %uid, "Mirror update after verification failed");
            } else {
                tracing::info!(uid = %uid, "Email verified via callback");
            }
        }
        None => tracing::warn!("Verified account could not be matched to a profile"),
    }

    if let Some(url) = &state.config.email_verification_success_url {
        return Redirect::to(url).into_response();
    }

    Html(page(
        "Email verified",
        "Your email address has been verified. You can close this window and log in.",
    ))
    .into_response()
}

/// Validate a password-reset code, then redirect to the frontend reset
/// page or serve the built-in form.
async fn handle_reset_password(state: Arc<AppState>, oob_code: &str) -> Response {
    if let Some(url) = &state.config.password_reset_url {
        let target = format!(
            "{}?mode=resetPassword&oobCode={}",
            url,
            urlencoding::encode(oob_code)
        );
        return Redirect::to(&target).into_response();
    }

    match state.firebase.check_oob_code(oob_code).await {
        Ok(info) => Html(reset_form(
            oob_code,
            info.email.as_deref().unwrap_or("your account"),
        ))
        .into_response(),
        Err(AppError::InvalidOobCode(_)) => (
            StatusCode::BAD_REQUEST,
            error_page(
                "Link expired",
                "This password reset link is invalid or has expired. Please request a new one.",
            ),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Reset code check failed");
            (
                StatusCode::BAD_GATEWAY,
                error_page("Something went wrong", "Please try again later."),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    pub oob_code: String,
    pub new_password: String,
}

/// Consume a reset code from the built-in form and set the new password.
async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Html<String>> {
    if form.new_password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    state
        .firebase
        .reset_password(&form.oob_code, &form.new_password)
        .await?;

    tracing::info!("Password reset completed");

    Ok(Html(page(
        "Password updated",
        "Your password has been changed. You can now log in with the new password.",
    )))
}

// ─── Minimal HTML Pages ──────────────────────────────────────

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family:sans-serif;max-width:32rem;margin:4rem auto\">\
         <h1>{title}</h1><p>{body}</p></body></html>"
    )
}

fn error_page(title: &str, body: &str) -> Html<String> {
    Html(page(title, body))
}

fn reset_form(oob_code: &str, email: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Reset password</title></head>\
         <body style=\"font-family:sans-serif;max-width:32rem;margin:4rem auto\">\
         <h1>Reset password</h1><p>Choose a new password for {email}.</p>\
         <form method=\"post\" action=\"/auth/reset-password-confirm\">\
         <input type=\"hidden\" name=\"oob_code\" value=\"{code}\">\
         <input type=\"password\" name=\"new_password\" minlength=\"6\" required \
         placeholder=\"New password\">\
         <button type=\"submit\">Set password</button>\
         </form></body></html>",
        email = escape_html(email),
        code = escape_html(oob_code),
    )
}

/// Escape the characters that break out of HTML text or attribute
/// context. Both interpolated values come from the provider response,
/// not from us.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
