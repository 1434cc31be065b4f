// SPDX-License-Identifier: MIT

//! Tether Auth API Server
//!
//! Account registration, login and email verification backed by Firebase
//! Authentication, with user profiles stored in Firestore.

use std::sync::Arc;
use tether_auth::{
    config::Config,
    db::FirestoreDb,
    services::{FirebaseClient, IdTokenVerifier, VerificationSync},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Tether Auth API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Identity Toolkit REST client
    let firebase = FirebaseClient::new(&config.firebase_api_key);

    let verifier =
        Arc::new(IdTokenVerifier::new(&config).expect("Failed to initialize token verifier"));

    // Verification sync coordinator over the provider and profile store
    let sync = VerificationSync::new(firebase.clone(), db.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        firebase,
        verifier,
        sync,
    });

    // Build router
    let app = tether_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tether_auth=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
