// SPDX-License-Identifier: MIT

//! Verification sync coordinator.
//!
//! The identity provider owns the true email-verification state; the local
//! profile store keeps a mirrored copy so the rest of the application can
//! read it without a remote call. This module reconciles the two: whenever
//! the provider reports a user as verified and the local profile still says
//! otherwise, the local flag is flipped to true.
//!
//! The mirror is strictly one-directional and monotonic. The coordinator
//! never writes false, never creates or deletes profile records, and never
//! treats the local value as authoritative. Because the only mutation is an
//! idempotent set-true, concurrent reconciliations for the same user are
//! safe without locking.

use crate::error::{AppError, Result};
use crate::models::UserProfile;
use std::future::Future;

/// Read access to the authoritative verification flag.
///
/// Implemented by the Firebase client; test code substitutes fakes.
pub trait IdentityProvider: Send + Sync {
    /// Fetch the authoritative verification flag for a subject id.
    fn fetch_verified(&self, uid: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// The profile-store operations the coordinator needs: one read and the
/// single mutation this subsystem ever performs.
pub trait ProfileStore: Send + Sync {
    fn load_profile(&self, uid: &str) -> impl Future<Output = Result<Option<UserProfile>>> + Send;

    /// Persist `email_verified = true` for the given profile.
    fn mark_verified(&self, uid: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Coordinator reconciling the local verification mirror with the provider.
///
/// Constructed once at startup with concrete provider/store handles and
/// shared through [`crate::AppState`]; cheap to clone.
#[derive(Clone)]
pub struct VerificationSync<P, S> {
    provider: P,
    store: S,
}

impl<P, S> VerificationSync<P, S>
where
    P: IdentityProvider + Clone + Send + Sync + 'static,
    S: ProfileStore + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P, store: S) -> Self {
        Self { provider, store }
    }

    /// Reconcile the local mirror for one user and return the authoritative
    /// verification flag.
    ///
    /// The authoritative read happens first; if it fails, nothing is
    /// mutated and the stale local value stays intact. A missing profile
    /// record is a logged skip, not an error. The local write only fires
    /// for the false-to-true transition, so repeated calls with unchanged
    /// provider state perform no writes.
    pub async fn reconcile(&self, uid: &str) -> Result<bool> {
        let verified = self.provider.fetch_verified(uid).await?;

        let Some(profile) = self.store.load_profile(uid).await? else {
            tracing::warn!(uid, "profile record not found, skipping verification sync");
            return Ok(verified);
        };

        if verified && !profile.email_verified {
            self.store.mark_verified(uid).await?;
            tracing::info!(uid, "email verification synced to profile store");
        }

        Ok(verified)
    }

    /// Fire-and-forget reconciliation for the request-time trigger.
    ///
    /// Runs detached from the calling request; failures are logged and
    /// must never surface to the request that spawned them.
    pub fn spawn_reconcile(&self, uid: &str) {
        let sync = self.clone();
        let uid = uid.to_string();
        tokio::spawn(async move {
            if let Err(e) = sync.reconcile(&uid).await {
                tracing::warn!(error = %e, uid = %uid, "background verification sync failed");
            }
        });
    }
}
