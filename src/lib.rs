// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! HealthOS Companion: backend for the remote patient-monitoring client
//!
//! This crate provides the API that walks a patient through onboarding
//! (account, verification, patient record, wearable pairing), mirrors the
//! wearable's measurement session, and serves the heart-rate history.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod prefs;
pub mod routes;
pub mod services;
pub mod session;
pub mod validation;

use config::Config;
use db::FirestoreDb;
use prefs::PrefStore;
use services::{HistoryService, IdentityClient, MeasurementService, OnboardingService};
use session::SessionStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity: IdentityClient,
    pub prefs: PrefStore,
    pub sessions: SessionStore,
    pub onboarding: OnboardingService,
    pub measurement: MeasurementService,
    pub history: HistoryService,
}
