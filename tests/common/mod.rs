// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use healthos_companion::config::Config;
use healthos_companion::db::FirestoreDb;
use healthos_companion::prefs::PrefStore;
use healthos_companion::routes::create_router;
use healthos_companion::services::{
    HistoryService, IdentityClient, MeasurementService, OnboardingService,
};
use healthos_companion::session::SessionStore;
use healthos_companion::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let identity = IdentityClient::new_mock();
    let prefs = PrefStore::in_memory();
    let sessions = SessionStore::new();

    let onboarding = OnboardingService::new(
        db.clone(),
        identity.clone(),
        prefs.clone(),
        sessions.clone(),
    );
    let measurement = MeasurementService::new(db.clone(), prefs.clone(), sessions.clone());
    let history = HistoryService::new(db.clone(), prefs.clone());

    let state = Arc::new(AppState {
        config,
        db,
        identity,
        prefs,
        sessions,
        onboarding,
        measurement,
        history,
    });

    (create_router(state.clone()), state)
}

/// Create a session JWT the way the auth routes do.
#[allow(dead_code)]
pub fn create_test_jwt(uid: &str, email: &str, signing_key: &[u8]) -> String {
    healthos_companion::middleware::auth::create_jwt(uid, email, signing_key)
        .expect("Failed to create JWT")
}
