// SPDX-License-Identifier: MIT

use axum::{routing::post, Json, Router};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tether_auth::config::Config;
use tether_auth::db::FirestoreDb;
use tether_auth::routes::create_router;
use tether_auth::services::{FirebaseClient, IdTokenVerifier, VerificationSync};
use tether_auth::AppState;

/// Signing secret shared between token minting and the static verifier.
pub const SIGNING_SECRET: &[u8] = b"integration-test-secret";
pub const TEST_KID: &str = "test-kid";

#[derive(Serialize)]
struct Claims {
    sub: String,
    iss: String,
    aud: String,
    exp: usize,
    iat: usize,
    email: String,
    email_verified: bool,
}

fn mint_token(uid: &str, email: &str, email_verified: bool, exp_offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: uid.to_string(),
        iss: "https://securetoken.google.com/test-project".to_string(),
        aud: "test-project".to_string(),
        exp: (now + exp_offset_secs) as usize,
        iat: now as usize,
        email: email.to_string(),
        email_verified,
    };

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(SIGNING_SECRET)).unwrap()
}

/// Mint an ID token the test app's verifier will accept.
#[allow(dead_code)]
pub fn create_test_id_token(uid: &str, email: &str, email_verified: bool) -> String {
    mint_token(uid, email, email_verified, 3600)
}

/// Mint a token that expired beyond the verifier's clock-skew leeway.
#[allow(dead_code)]
pub fn create_expired_id_token(uid: &str, email: &str) -> String {
    mint_token(uid, email, false, -3600)
}

/// Create a test app with an offline profile store and a static-key
/// verifier. `provider_origin` points the Firebase client at a local
/// stub server; when None, provider calls hit an unroutable port and
/// fail fast.
#[allow(dead_code)]
pub fn create_test_app(provider_origin: Option<&str>) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();

    let db = FirestoreDb::new_mock();

    let firebase = match provider_origin {
        Some(origin) => FirebaseClient::with_emulator(&config.firebase_api_key, origin),
        None => FirebaseClient::with_emulator(&config.firebase_api_key, "http://127.0.0.1:1"),
    };

    let verifier = Arc::new(
        IdTokenVerifier::new_with_static_key(
            &config,
            TEST_KID,
            DecodingKey::from_secret(SIGNING_SECRET),
            Algorithm::HS256,
        )
        .unwrap(),
    );

    let sync = VerificationSync::new(firebase.clone(), db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        firebase,
        verifier,
        sync,
    });

    (create_router(state.clone()), state)
}

/// Scriptable stand-in for the Identity Toolkit backend.
#[derive(Default)]
pub struct StubProvider {
    /// emailVerified reported by lookup calls
    pub verified: AtomicBool,
    /// make signInWithPassword fail with INVALID_PASSWORD
    pub reject_password: AtomicBool,
    /// make oob-code operations fail with INVALID_OOB_CODE
    pub reject_oob: AtomicBool,
}

/// Spawn a local HTTP server that answers the Identity Toolkit endpoints
/// the app calls. Returns its origin URL.
#[allow(dead_code)]
pub async fn spawn_stub_provider(stub: Arc<StubProvider>) -> String {
    let sign_in_stub = stub.clone();
    let lookup_stub = stub.clone();
    let update_stub = stub.clone();

    let app = Router::new()
        .route(
            "/identitytoolkit.googleapis.com/v1/accounts:signInWithPassword",
            post(move |Json(body): Json<Value>| {
                let stub = sign_in_stub.clone();
                async move {
                    if stub.reject_password.load(Ordering::SeqCst) {
                        return (
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({"error": {"message": "INVALID_PASSWORD"}})),
                        );
                    }

                    let email = body["email"].as_str().unwrap_or("user@example.com");
                    (
                        axum::http::StatusCode::OK,
                        Json(json!({
                            "localId": "stub-uid",
                            "email": email,
                            "idToken": "stub-id-token",
                            "refreshToken": "stub-refresh-token",
                            "expiresIn": "3600",
                        })),
                    )
                }
            }),
        )
        .route(
            "/identitytoolkit.googleapis.com/v1/accounts:lookup",
            post(move |Json(_body): Json<Value>| {
                let stub = lookup_stub.clone();
                async move {
                    Json(json!({
                        "users": [{
                            "localId": "stub-uid",
                            "email": "user@example.com",
                            "emailVerified": stub.verified.load(Ordering::SeqCst),
                            "disabled": false,
                        }]
                    }))
                }
            }),
        )
        .route(
            "/identitytoolkit.googleapis.com/v1/accounts:update",
            post(move |Json(body): Json<Value>| {
                let stub = update_stub.clone();
                async move {
                    if body.get("oobCode").is_some() && stub.reject_oob.load(Ordering::SeqCst) {
                        return (
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({"error": {"message": "INVALID_OOB_CODE"}})),
                        );
                    }

                    if body.get("oobCode").is_some() {
                        stub.verified.store(true, Ordering::SeqCst);
                    }
                    (
                        axum::http::StatusCode::OK,
                        Json(json!({
                            "localId": "stub-uid",
                            "email": "user@example.com",
                        })),
                    )
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}
