// SPDX-License-Identifier: MIT

//! Firebase Identity Toolkit REST client.
//!
//! Wraps the subset of the Identity Toolkit and Secure Token APIs this
//! service uses: account creation, password sign-in, account lookup,
//! token refresh, out-of-band (oob) email flows, and account deletion.
//!
//! When FIREBASE_AUTH_EMULATOR_HOST is set, all calls target the local
//! Auth Emulator instead of production Google endpoints.

use crate::error::{AppError, Result};
use crate::services::sync::IdentityProvider;
use serde::Deserialize;
use serde_json::json;

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const TOKEN_BASE: &str = "https://securetoken.googleapis.com/v1";

/// REST client for the Firebase Authentication backend.
#[derive(Clone)]
pub struct FirebaseClient {
    http: reqwest::Client,
    api_key: String,
    identity_url: String,
    token_url: String,
}

/// Tokens and account info returned by sign-up / sign-in calls.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub local_id: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
}

/// One account record from an accounts:lookup response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub local_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub display_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

/// Refreshed session from the Secure Token API. Unlike the Identity
/// Toolkit, this endpoint speaks snake_case.
#[derive(Debug, Deserialize)]
pub struct RefreshedTokens {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub user_id: String,
}

/// Result of applying a verification oob code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OobConfirmation {
    pub local_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OobCodeInfo {
    pub email: Option<String>,
    pub request_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

impl FirebaseClient {
    /// Create a client for the configured Firebase project.
    ///
    /// Honors FIREBASE_AUTH_EMULATOR_HOST the same way the official SDKs
    /// do: the value is a bare host:port and the emulator proxies both
    /// APIs under path prefixes.
    pub fn new(api_key: &str) -> Self {
        match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => {
                tracing::info!(host = %host, "Using Firebase Auth Emulator");
                Self::with_base_urls(
                    api_key,
                    format!("http://{}/identitytoolkit.googleapis.com/v1", host),
                    format!("http://{}/securetoken.googleapis.com/v1", host),
                )
            }
            Err(_) => Self::with_base_urls(api_key, IDENTITY_BASE.into(), TOKEN_BASE.into()),
        }
    }

    /// Create a client pointed at an arbitrary origin. Used by tests to
    /// target a local stub server.
    pub fn with_emulator(api_key: &str, origin: &str) -> Self {
        Self::with_base_urls(
            api_key,
            format!("{}/identitytoolkit.googleapis.com/v1", origin),
            format!("{}/securetoken.googleapis.com/v1", origin),
        )
    }

    fn with_base_urls(api_key: &str, identity_url: String, token_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            identity_url,
            token_url,
        }
    }

    /// POST a JSON body to an Identity Toolkit endpoint and decode the
    /// response, translating provider error codes.
    async fn post_identity<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{}?key={}", self.identity_url, endpoint, self.api_key);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Request to {} failed: {}", endpoint, e)))?;

        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::Provider(format!("Invalid response from {}: {}", endpoint, e)))
        } else {
            let status = response.status();
            match response.json::<ProviderErrorBody>().await {
                Ok(body) => Err(AppError::from_provider_message(&body.error.message)),
                Err(_) => Err(AppError::Provider(format!(
                    "{} returned status {}",
                    endpoint, status
                ))),
            }
        }
    }

    // ─── Account Lifecycle ───────────────────────────────────────

    /// Create a new email/password account. The account starts unverified.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens> {
        self.post_identity(
            "accounts:signUp",
            json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Set the display name on a freshly created account.
    pub async fn set_display_name(&self, id_token: &str, display_name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_identity(
                "accounts:update",
                json!({
                    "idToken": id_token,
                    "displayName": display_name,
                    "returnSecureToken": false,
                }),
            )
            .await?;
        Ok(())
    }

    /// Email/password sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens> {
        self.post_identity(
            "accounts:signInWithPassword",
            json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Look up the account behind an ID token.
    pub async fn lookup_by_token(&self, id_token: &str) -> Result<AccountInfo> {
        let mut response: LookupResponse = self
            .post_identity("accounts:lookup", json!({ "idToken": id_token }))
            .await?;

        response
            .users
            .pop()
            .ok_or_else(|| AppError::NotFound("No account for this token".to_string()))
    }

    /// Look up an account by UID. Requires emulator or admin credentials
    /// in the API key's project.
    pub async fn lookup_by_uid(&self, uid: &str) -> Result<AccountInfo> {
        let mut response: LookupResponse = self
            .post_identity("accounts:lookup", json!({ "localId": [uid] }))
            .await?;

        response
            .users
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("No account with uid {}", uid)))
    }

    /// Exchange a refresh token for a new ID token.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        let url = format!("{}/token?key={}", self.token_url, self.api_key);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token refresh request failed: {}", e)))?;

        if response.status().is_success() {
            response
                .json::<RefreshedTokens>()
                .await
                .map_err(|e| AppError::Provider(format!("Invalid token refresh response: {}", e)))
        } else {
            match response.json::<ProviderErrorBody>().await {
                Ok(body) => Err(AppError::from_provider_message(&body.error.message)),
                Err(_) => Err(AppError::InvalidToken),
            }
        }
    }

    /// Delete the account behind an ID token.
    pub async fn delete_account(&self, id_token: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_identity("accounts:delete", json!({ "idToken": id_token }))
            .await?;
        Ok(())
    }

    // ─── Out-of-band Email Flows ─────────────────────────────────

    /// Send a verification email to the account behind an ID token.
    pub async fn send_verification_email(&self, id_token: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_identity(
                "accounts:sendOobCode",
                json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": id_token,
                }),
            )
            .await?;
        Ok(())
    }

    /// Send a password reset email.
    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_identity(
                "accounts:sendOobCode",
                json!({
                    "requestType": "PASSWORD_RESET",
                    "email": email,
                }),
            )
            .await?;
        Ok(())
    }

    /// Apply an email-verification oob code, flipping the provider-side
    /// flag to verified. Returns whatever identity info the provider
    /// includes in the confirmation.
    pub async fn confirm_verification(&self, oob_code: &str) -> Result<OobConfirmation> {
        self.post_identity("accounts:update", json!({ "oobCode": oob_code }))
            .await
    }

    /// Check a password-reset oob code without consuming it.
    pub async fn check_oob_code(&self, oob_code: &str) -> Result<OobCodeInfo> {
        self.post_identity("accounts:resetPassword", json!({ "oobCode": oob_code }))
            .await
    }

    /// Consume a password-reset oob code and set the new password.
    pub async fn reset_password(&self, oob_code: &str, new_password: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_identity(
                "accounts:resetPassword",
                json!({
                    "oobCode": oob_code,
                    "newPassword": new_password,
                }),
            )
            .await?;
        Ok(())
    }

    /// Change the password of a signed-in account.
    pub async fn update_password(&self, id_token: &str, new_password: &str) -> Result<AuthTokens> {
        self.post_identity(
            "accounts:update",
            json!({
                "idToken": id_token,
                "password": new_password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Force-mark an account as verified without an oob code.
    ///
    /// Only works against the Auth Emulator or with admin credentials;
    /// exposed through a development-only route.
    pub async fn set_verified_admin(&self, uid: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_identity(
                "accounts:update",
                json!({
                    "localId": uid,
                    "emailVerified": true,
                }),
            )
            .await?;
        Ok(())
    }
}

impl IdentityProvider for FirebaseClient {
    async fn fetch_verified(&self, uid: &str) -> Result<bool> {
        let account = self.lookup_by_uid(uid).await?;
        Ok(account.email_verified)
    }
}
