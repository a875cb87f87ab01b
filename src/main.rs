// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HealthOS Companion API Server
//!
//! Backend for the remote patient-monitoring client: onboarding and
//! wearable pairing, measurement session mirroring, heart-rate history.

use healthos_companion::{
    config::Config,
    db::FirestoreDb,
    prefs::PrefStore,
    services::{HistoryService, IdentityClient, MeasurementService, OnboardingService},
    session::SessionStore,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting HealthOS Companion API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Identity Toolkit client for credential operations
    let identity = IdentityClient::new(&config.identity_url, &config.firebase_api_key);
    tracing::info!(url = %config.identity_url, "Identity client initialized");

    // Durable per-user preference cache
    let prefs = if config.prefs_path.is_empty() {
        PrefStore::in_memory()
    } else {
        PrefStore::load(&config.prefs_path)
    };

    // In-process session registry
    let sessions = SessionStore::new();

    let onboarding = OnboardingService::new(
        db.clone(),
        identity.clone(),
        prefs.clone(),
        sessions.clone(),
    );
    let measurement = MeasurementService::new(db.clone(), prefs.clone(), sessions.clone());
    let history = HistoryService::new(db.clone(), prefs.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        identity,
        prefs,
        sessions,
        onboarding,
        measurement,
        history,
    });

    // Build router
    let app = healthos_companion::routes::create_router(state);

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
                .add_directive("healthos_companion=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
