// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Heart-rate history route.

use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::history::HistorySeries;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(get_history))
}

/// Shaped history series for the signed-in user.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HistorySeries>> {
    Ok(Json(state.history.series(&user.uid).await?))
}
