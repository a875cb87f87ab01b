// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Measurement session routes.
//!
//! Every route requires the cached pairing keys; a fresh install has to
//! pair before any of these are usable, even when the backend knows of
//! an active device.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::session::MeasurementState;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/measurement/session", post(open_session).delete(close_session))
        .route("/measurement/start", post(start_measurement))
        .route("/measurement/stop", post(stop_measurement))
        .route("/measurement/current", get(current_measurement))
}

/// Open the measurement view: start the device watcher.
async fn open_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeasurementState>> {
    let keys = state.measurement.pairing_keys(&user.uid)?;
    let session = super::resolve_session(&state, &user).await;
    Ok(Json(state.measurement.open(&session, &keys).await))
}

/// Close the measurement view: stop the watcher, stop a running measurement.
async fn close_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    let keys = state.measurement.pairing_keys(&user.uid)?;
    let session = super::resolve_session(&state, &user).await;
    state.measurement.close(&session, &keys).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Command the wearable to start measuring.
async fn start_measurement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeasurementState>> {
    let keys = state.measurement.pairing_keys(&user.uid)?;
    let session = super::resolve_session(&state, &user).await;
    let snapshot = state.measurement.start(&session, &keys).await?;
    Ok(Json(snapshot))
}

/// Command the wearable to stop measuring.
async fn stop_measurement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeasurementState>> {
    let keys = state.measurement.pairing_keys(&user.uid)?;
    let session = super::resolve_session(&state, &user).await;
    let snapshot = state.measurement.stop(&session, &keys).await?;
    Ok(Json(snapshot))
}

/// Live measurement view from the session mirror.
async fn current_measurement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeasurementState>> {
    state.measurement.pairing_keys(&user.uid)?;
    let session = super::resolve_session(&state, &user).await;
    Ok(Json(state.measurement.current(&session).await))
}
