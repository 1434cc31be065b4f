// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed user-profile operations.
//!
//! Profiles are stored in the `users` collection, keyed by the Firebase
//! UID. Usernames and emails are plain fields looked up by query; the
//! registration handler enforces username uniqueness before inserting.

use crate::db::collections;
use crate::error::AppError;
use crate::models::UserProfile;
use crate::services::sync::ProfileStore;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Profile Operations ─────────────────────────────────

    /// Get a user profile by Firebase UID.
    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user profile by email address.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        let email = email.to_string();
        let mut matches: Vec<UserProfile> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("email").eq(email.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.pop())
    }

    /// Find a user profile by username (stored lower-cased).
    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserProfile>, AppError> {
        let username = username.to_lowercase();
        let mut matches: Vec<UserProfile> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("username").eq(username.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.pop())
    }

    /// Create or replace a user profile document.
    pub async fn upsert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.firebase_uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Set `email_verified = true` on a user profile.
    ///
    /// A profile deleted between the read and the write is logged and
    /// ignored; the write only ever sets the flag forward.
    pub async fn set_email_verified(&self, uid: &str) -> Result<(), AppError> {
        let Some(mut user) = self.get_user(uid).await? else {
            tracing::warn!(uid, "Cannot mark verification, profile missing");
            return Ok(());
        };

        user.email_verified = true;
        self.upsert_user(&user).await
    }

    /// Record a credential login: stamp `last_login` and latch the
    /// verification mirror in a single document write. One upsert means
    /// the login path cannot write back a stale `email_verified`
    /// snapshot over a concurrent verification.
    pub async fn record_login(&self, uid: &str, verified: bool) -> Result<(), AppError> {
        let Some(mut user) = self.get_user(uid).await? else {
            return Ok(());
        };

        user.record_login(verified, chrono::Utc::now().to_rfc3339());
        self.upsert_user(&user).await
    }

    /// Delete a user profile document.
    pub async fn delete_user(&self, uid: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(uid, "Deleted user profile");
        Ok(())
    }
}

impl ProfileStore for FirestoreDb {
    async fn load_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_user(uid).await
    }

    async fn mark_verified(&self, uid: &str) -> Result<(), AppError> {
        self.set_email_verified(uid).await
    }
}
