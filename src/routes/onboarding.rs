// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding routes: step evaluation, patient info, device pairing.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::onboarding::{OnboardingStep, PairRequest, PatientInfoRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/onboarding/step", get(current_step))
        .route("/onboarding/patient", post(save_patient_info))
        .route("/onboarding/pair", post(pair_device))
}

/// Re-evaluate where the signed-in user is in the flow.
async fn current_step(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OnboardingStep>> {
    let session = super::resolve_session(&state, &user).await;
    Ok(Json(state.onboarding.evaluate(&session).await))
}

/// Store the patient record and move on to pairing.
async fn save_patient_info(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PatientInfoRequest>,
) -> Result<(StatusCode, Json<OnboardingStep>)> {
    let session = super::resolve_session(&state, &user).await;
    let step = state.onboarding.save_patient_info(&session, req).await?;
    Ok((StatusCode::CREATED, Json(step)))
}

/// Bind a scanned wearable to the patient record.
async fn pair_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PairRequest>,
) -> Result<Json<OnboardingStep>> {
    let session = super::resolve_session(&state, &user).await;
    let step = state.onboarding.pair_device(&session, req).await?;
    Ok(Json(step))
}
