//! User profile model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore, keyed by the Firebase UID.
///
/// The authoritative copy of `email_verified` lives with the identity
/// provider; this field is an eventually consistent mirror maintained by
/// the verification sync coordinator. It starts false at registration and
/// only ever transitions to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Firebase user ID (also used as document ID)
    pub firebase_uid: String,
    /// Unique handle, lower-cased at registration
    pub username: String,
    /// Email address as registered
    pub email: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Mirrored email verification flag
    pub email_verified: bool,
    /// Account active status
    pub is_active: bool,
    /// When the account was registered (ISO 8601)
    pub created_at: String,
    /// Last credential login (ISO 8601)
    pub last_login: Option<String>,
}

impl UserProfile {
    /// Fold a credential login into the profile: stamp `last_login` and
    /// latch the verification mirror. The flag only ever moves forward,
    /// so a login observed with a stale `verified = false` can never
    /// undo a concurrent verification.
    pub fn record_login(&mut self, verified: bool, now: String) {
        self.last_login = Some(now);
        if verified {
            self.email_verified = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(email_verified: bool) -> UserProfile {
        UserProfile {
            firebase_uid: "uid-1".to_string(),
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email_verified,
            is_active: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            last_login: None,
        }
    }

    #[test]
    fn test_record_login_stamps_timestamp() {
        let mut p = profile(false);
        p.record_login(false, "2026-08-25T10:00:00Z".to_string());

        assert_eq!(p.last_login.as_deref(), Some("2026-08-25T10:00:00Z"));
        assert!(!p.email_verified);
    }

    #[test]
    fn test_record_login_latches_verified() {
        let mut p = profile(false);
        p.record_login(true, "2026-08-25T10:00:00Z".to_string());

        assert!(p.email_verified);
    }

    #[test]
    fn test_record_login_never_reverts_verified() {
        // A login carrying verified=false must not undo a flag that a
        // concurrent verification already set.
        let mut p = profile(true);
        p.record_login(false, "2026-08-25T10:00:00Z".to_string());

        assert!(p.email_verified);
        assert!(p.last_login.is_some());
    }
}
