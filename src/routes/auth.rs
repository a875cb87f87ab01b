// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes: sign-up, sign-in, verification, reset, deletion.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, Claims};
use crate::services::onboarding::{OnboardingStep, SignInRequest, SignUpRequest};
use crate::AppState;

/// Cookie the middleware accepts as an alternative to the Bearer header.
/// Set client-side; the API hands the token out in the response body.
const SESSION_COOKIE: &str = "healthos_token";

/// Routes that work without a session token.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/password-reset", post(password_reset))
}

/// Routes that require a valid session token.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/verification", get(verification_status))
        .route("/auth/verification/resend", post(resend_verification))
        .route("/auth/account", delete(delete_account))
}

/// Session token plus the onboarding step the client should show next.
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub email: String,
    #[serde(flatten)]
    pub step: OnboardingStep,
}

/// Generic one-line message response.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Create an account and start the verification flow.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (session, step) = state.onboarding.sign_up(req).await?;
    let token = create_jwt(&session.uid, &session.email, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            email: session.email.clone(),
            step,
        }),
    ))
}

/// Authenticate and report the next onboarding step.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<AuthResponse>> {
    let (session, step) = state.onboarding.sign_in(req).await?;
    let token = create_jwt(&session.uid, &session.email, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    Ok(Json(AuthResponse {
        token,
        email: session.email.clone(),
        step,
    }))
}

/// Identify the caller from the session token without rejecting expired
/// ones; sign-out must clear server-side state from any point.
fn token_uid(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::to_string)
        })?;

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    decode::<Claims>(&token, &key, &validation)
        .map(|data| data.claims.sub)
        .ok()
}

/// End the session: abort background tasks, drop cached pairing keys.
///
/// Always succeeds. Without a usable token there is nothing server-side
/// to clear and the client just drops its copy.
async fn sign_out(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> StatusCode {
    if let Some(uid) = token_uid(&state, &jar, &headers) {
        state.onboarding.sign_out(&uid).await;
    }
    StatusCode::NO_CONTENT
}

/// Current verification state of the signed-in account.
#[derive(Serialize)]
pub struct VerificationResponse {
    pub verified: bool,
}

async fn verification_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<VerificationResponse>> {
    let verified = state
        .onboarding
        .verification_status(&user.uid, &user.email)
        .await?;
    Ok(Json(VerificationResponse { verified }))
}

async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>> {
    state.onboarding.resend_verification(&user.uid).await?;
    Ok(Json(MessageResponse {
        message: "Verification email sent!".to_string(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Ask the credential store to email a password reset link.
async fn password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>> {
    let message = state.onboarding.request_password_reset(&req.email).await?;
    Ok(Json(MessageResponse { message }))
}

/// Delete the credential account and clear local state.
///
/// Stored patient documents and measurement rows are kept.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    tracing::info!(email = %user.email, "User-initiated account deletion");
    state.onboarding.delete_account(&user.uid).await?;
    Ok(StatusCode::NO_CONTENT)
}
