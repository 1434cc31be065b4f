// SPDX-License-Identifier: MIT

//! Firebase ID token verification.
//!
//! Validates the RS256 tokens minted by Firebase Authentication against
//! the securetoken signing keys, which Google publishes as a JWKS
//! document. Keys are cached per the Cache-Control max-age on the
//! response and refreshed on unknown kid, so key rotation needs no
//! restart.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use axum::http::HeaderValue;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from a valid Firebase ID token.
///
/// `email_verified` here is the claim snapshot from token mint time; the
/// sync coordinator consults the provider directly when freshness matters.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

#[derive(Clone)]
enum VerifierMode {
    Jwks,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
        algorithm: Algorithm,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Firebase-issued ID tokens.
pub struct IdTokenVerifier {
    http_client: reqwest::Client,
    expected_issuer: String,
    expected_audience: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl IdTokenVerifier {
    /// Create a production verifier that fetches and caches the
    /// securetoken JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        let expected_issuer = format!("https://securetoken.google.com/{}", config.gcp_project_id);

        tracing::info!(
            issuer = %expected_issuer,
            audience = %config.gcp_project_id,
            "Initialized Firebase ID token verifier"
        );

        Ok(Self {
            http_client,
            expected_issuer,
            expected_audience: config.gcp_project_id.clone(),
            mode: VerifierMode::Jwks,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a static key and algorithm.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
        algorithm: Algorithm,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static verifier kid must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        Ok(Self {
            http_client,
            expected_issuer: format!("https://securetoken.google.com/{}", config.gcp_project_id),
            expected_audience: config.gcp_project_id.clone(),
            mode: VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
                algorithm,
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a bearer token from an Authorization header.
    pub async fn verify_bearer(
        &self,
        auth_header: Option<&HeaderValue>,
    ) -> Result<VerifiedIdentity, AppError> {
        self.verify(extract_bearer_token(auth_header)?).await
    }

    /// Verify an ID token and extract the caller's identity.
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        let header = decode_header(token).map_err(|_| AppError::InvalidToken)?;

        let expected_alg = match &self.mode {
            VerifierMode::Jwks => Algorithm::RS256,
            VerifierMode::StaticKey { algorithm, .. } => *algorithm,
        };

        if header.alg != expected_alg {
            tracing::debug!(alg = ?header.alg, "Rejecting token with unexpected algorithm");
            return Err(AppError::InvalidToken);
        }

        let kid = header.kid.ok_or(AppError::InvalidToken)?;
        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(expected_alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => {
                    tracing::debug!(error = %e, "ID token validation failed");
                    AppError::InvalidToken
                }
            })?;

        let claims = token_data.claims;

        if claims.sub.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(false),
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
                ..
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                tracing::debug!(kid, "Unknown kid for static verifier");
                return Err(AppError::InvalidToken);
            }
            VerifierMode::Jwks => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // A miss may be a rotated key the cache predates; retry once with
        // a forced refresh before giving up.
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        tracing::warn!(kid, "JWT kid not found in JWKS after refresh");
        Err(AppError::InvalidToken)
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!("Refreshing securetoken JWKS cache");

        let response = self
            .http_client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }

            if jwk.kid.trim().is_empty() {
                continue;
            }

            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }

            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AppError::Provider(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "securetoken JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

fn extract_bearer_token(auth_header: Option<&HeaderValue>) -> Result<&str, AppError> {
    let value = auth_header
        .ok_or(AppError::MissingToken)?
        .to_str()
        .map_err(|_| AppError::InvalidToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidToken)?;

    if token.is_empty() {
        return Err(AppError::MissingToken);
    }

    Ok(token)
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const TEST_SECRET: &[u8] = b"verifier-unit-test-secret";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        iss: String,
        aud: String,
        exp: usize,
        iat: usize,
        email: String,
        email_verified: bool,
    }

    fn test_verifier() -> IdTokenVerifier {
        IdTokenVerifier::new_with_static_key(
            &Config::test_default(),
            "test-kid",
            DecodingKey::from_secret(TEST_SECRET),
            Algorithm::HS256,
        )
        .unwrap()
    }

    fn make_token(sub: &str, exp_offset_secs: i64, email_verified: bool) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: sub.to_string(),
            iss: "https://securetoken.google.com/test-project".to_string(),
            aud: "test-project".to_string(),
            exp: (now + exp_offset_secs) as usize,
            iat: now as usize,
            email: "user@example.com".to_string(),
            email_verified,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-kid".to_string());
        encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).unwrap()
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let verifier = test_verifier();
        let token = make_token("uid-123", 3600, true);

        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.uid, "uid-123");
        assert_eq!(identity.email.as_deref(), Some("user@example.com"));
        assert!(identity.email_verified);
    }

    #[tokio::test]
    async fn test_verify_expired_token() {
        let verifier = test_verifier();
        let token = make_token("uid-123", -3600, true);

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::ExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_wrong_kid() {
        let verifier = test_verifier();
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: "uid-123".to_string(),
            iss: "https://securetoken.google.com/test-project".to_string(),
            aud: "test-project".to_string(),
            exp: (now + 3600) as usize,
            iat: now as usize,
            email: "user@example.com".to_string(),
            email_verified: false,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("other-kid".to_string());
        let token = encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).unwrap();

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_wrong_audience() {
        let verifier = test_verifier();
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: "uid-123".to_string(),
            iss: "https://securetoken.google.com/test-project".to_string(),
            aud: "some-other-project".to_string(),
            exp: (now + 3600) as usize,
            iat: now as usize,
            email: "user@example.com".to_string(),
            email_verified: false,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-kid".to_string());
        let token = encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).unwrap();

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_garbage_token() {
        let verifier = test_verifier();
        assert!(matches!(
            verifier.verify("not-a-jwt").await,
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_extract_bearer_token_errors() {
        assert!(matches!(
            extract_bearer_token(None),
            Err(AppError::MissingToken)
        ));

        let bad = HeaderValue::from_static("Basic abc");
        assert!(matches!(
            extract_bearer_token(Some(&bad)),
            Err(AppError::InvalidToken)
        ));

        let empty = HeaderValue::from_static("Bearer ");
        assert!(matches!(
            extract_bearer_token(Some(&empty)),
            Err(AppError::MissingToken)
        ));
    }

    #[test]
    fn test_parse_cache_control_max_age() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
    }
}
