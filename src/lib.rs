// SPDX-License-Identifier: MIT

//! Tether Auth: account and email-verification backend
//!
//! This crate provides the authentication API for Tether, backed by
//! Firebase Authentication for credentials and Firestore for user
//! profiles. The profile store mirrors the provider's email-verification
//! flag and keeps it in sync through the verification sync coordinator.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use services::{FirebaseClient, IdTokenVerifier, VerificationSync};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub firebase: FirebaseClient,
    pub verifier: Arc<IdTokenVerifier>,
    pub sync: VerificationSync<FirebaseClient, FirestoreDb>,
}
