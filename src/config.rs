//! Application configuration loaded from environment variables.
//!
//! The Firebase Web API key is not a secret (it identifies the project to
//! the Identity Toolkit API), but it is still read from the environment so
//! deployments can rotate it without a rebuild.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase Web API key for Identity Toolkit REST calls
    pub firebase_api_key: String,
    /// GCP project ID (Firebase project, also the ID token audience)
    pub gcp_project_id: String,
    /// Frontend URL for CORS and post-verification redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Optional redirect target after a successful email verification.
    /// When unset, the built-in success page is served instead.
    pub email_verification_success_url: Option<String>,
    /// Optional frontend page handling password resets. When unset, the
    /// built-in reset form is served instead.
    pub password_reset_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            email_verification_success_url: env::var("EMAIL_VERIFICATION_SUCCESS_URL").ok(),
            password_reset_url: env::var("PASSWORD_RESET_URL").ok(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: "test_api_key".to_string(),
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            email_verification_success_url: None,
            password_reset_url: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("FIREBASE_API_KEY", "test_key");
        env::set_var("GCP_PROJECT_ID", "test-project");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.firebase_api_key, "test_key");
        assert_eq!(config.gcp_project_id, "test-project");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_config_test_default() {
        let config = Config::test_default();
        assert!(config.email_verification_success_url.is_none());
        assert!(config.password_reset_url.is_none());
    }
}
