// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding workflow controller.
//!
//! Owns sign-up, sign-in and the step evaluation that routes a signed-in
//! user to the next onboarding action: verify email, capture patient info,
//! pair a wearable, or done. Evaluation reads are fail-open: a failed
//! lookup routes the user toward redoing that step instead of blocking
//! sign-in.

use crate::db::FirestoreDb;
use crate::error::{AppError, FieldErrors};
use crate::models::{DeviceStatus, PairingCode, PairingStatus, Patient, User, WearDevice};
use crate::prefs::PrefStore;
use crate::services::identity::{IdentityClient, IdentityCode, IdentityError};
use crate::session::{Session, SessionStore};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How often the background poller re-checks email verification.
pub const VERIFICATION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Where a signed-in user is in the onboarding flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OnboardingStep {
    SignedOut,
    AwaitingVerification,
    NeedsPatientInfo,
    NeedsPairing { patient_id: String },
    Ready,
}

/// Decide the next onboarding step for a signed-in user.
///
/// Pure so the routing rules are testable without a database: unverified
/// wins over everything, a missing patient record wins over device state.
pub fn next_step(verified: bool, patient_id: Option<&str>, device_active: bool) -> OnboardingStep {
    if !verified {
        return OnboardingStep::AwaitingVerification;
    }
    match patient_id {
        None => OnboardingStep::NeedsPatientInfo,
        Some(id) if !device_active => OnboardingStep::NeedsPairing {
            patient_id: id.to_string(),
        },
        Some(_) => OnboardingStep::Ready,
    }
}

/// Sign-up form payload.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    /// MM/DD/YYYY, raw digits accepted
    pub dob: String,
    pub phone: String,
    pub stay_connected: bool,
}

/// Sign-in form payload.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    pub stay_connected: bool,
}

/// Patient demographics payload.
///
/// Weight and height arrive as form strings and are parsed here so bad
/// input yields a field message rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatientInfoRequest {
    pub first_name: String,
    pub last_name: String,
    /// DD/MM/YYYY, raw digits accepted
    pub dob: String,
    pub weight: String,
    pub height: String,
}

/// Pairing payload: the scanned QR code plus device metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PairRequest {
    pub code: String,
    pub device_id: String,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
}

/// Onboarding workflow service.
#[derive(Clone)]
pub struct OnboardingService {
    db: FirestoreDb,
    identity: IdentityClient,
    prefs: PrefStore,
    sessions: SessionStore,
}

impl OnboardingService {
    pub fn new(
        db: FirestoreDb,
        identity: IdentityClient,
        prefs: PrefStore,
        sessions: SessionStore,
    ) -> Self {
        Self {
            db,
            identity,
            prefs,
            sessions,
        }
    }

    // ─── Sign-up ─────────────────────────────────────────────────

    /// Create an account: credential, verification email, user profile.
    ///
    /// The credential is rolled back if the verification email or the
    /// profile write fails, so a half-created account never blocks the
    /// email address.
    pub async fn sign_up(
        &self,
        req: SignUpRequest,
    ) -> Result<(Arc<Session>, OnboardingStep), AppError> {
        let dob = validation::format_dob_digits(&req.dob);
        self.validate_sign_up(&req, &dob)?;

        let user = match self.identity.sign_up(&req.email, &req.password).await {
            Ok(user) => user,
            Err(err) => return Err(map_sign_up_error(err)),
        };

        if let Err(err) = self.identity.send_verification(&user.id_token).await {
            tracing::warn!(error = %err, "Verification email failed, rolling back credential");
            self.rollback_credential(&user.id_token).await;
            return Err(AppError::field("email", "Failed to send verification email"));
        }

        let profile = User {
            email: user.email.clone(),
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            dob,
            phone: req.phone.trim().to_string(),
            uid: user.uid.clone(),
            is_verified: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(err) = self.db.upsert_user(&profile).await {
            tracing::warn!(error = %err, "User profile write failed, rolling back credential");
            self.rollback_credential(&user.id_token).await;
            return Err(AppError::Database(format!("Failed to create account: {}", err)));
        }

        self.prefs
            .update(&user.uid, |p| {
                p.stay_connected = req.stay_connected;
                p.user_email = Some(user.email.clone());
            })
            .await;

        let session = self
            .sessions
            .create(&user.uid, &user.email, &user.id_token, false)
            .await;
        self.spawn_verification_poller(&session).await;

        tracing::info!(email = %session.email, "Account created, verification pending");
        Ok((session, OnboardingStep::AwaitingVerification))
    }

    fn validate_sign_up(&self, req: &SignUpRequest, dob: &str) -> Result<(), AppError> {
        let mut fields = FieldErrors::new();
        validation::apply(&mut fields, "email", validation::check_email(&req.email));
        validation::apply(&mut fields, "password", validation::check_password(&req.password));
        if req.confirm_password.is_empty() {
            validation::apply(
                &mut fields,
                "confirm_password",
                Some("Please confirm your password"),
            );
        } else if req.confirm_password != req.password {
            validation::apply(
                &mut fields,
                "confirm_password",
                Some("The passwords you entered don't match. Please try again."),
            );
        }
        validation::apply(
            &mut fields,
            "first_name",
            validation::require(&req.first_name, "First name is required"),
        );
        validation::apply(
            &mut fields,
            "last_name",
            validation::require(&req.last_name, "Last name is required"),
        );
        validation::apply(&mut fields, "dob", validation::check_dob_mdy(dob));
        validation::apply(
            &mut fields,
            "phone",
            validation::require(&req.phone, "Phone is required"),
        );

        if fields.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(fields))
        }
    }

    /// Best-effort deletion of a credential created moments ago.
    async fn rollback_credential(&self, id_token: &str) {
        if let Err(err) = self.identity.delete_account(id_token).await {
            tracing::warn!(error = %err, "Credential rollback failed");
        }
    }

    // ─── Sign-in ─────────────────────────────────────────────────

    /// Check a credential and route the user to their next step.
    pub async fn sign_in(
        &self,
        req: SignInRequest,
    ) -> Result<(Arc<Session>, OnboardingStep), AppError> {
        let mut fields = FieldErrors::new();
        validation::apply(&mut fields, "email", validation::check_email(&req.email));
        validation::apply(&mut fields, "password", validation::check_password(&req.password));
        if !fields.is_empty() {
            return Err(AppError::Validation(fields));
        }

        let user = match self.identity.sign_in(&req.email, &req.password).await {
            Ok(user) => user,
            Err(err) => return Err(map_sign_in_error(err)),
        };

        // Live read of the verification flag. A failed lookup is treated
        // as unverified; the poller keeps checking.
        let verified = match self.identity.lookup(&user.id_token).await {
            Ok(info) => info.email_verified,
            Err(err) => {
                tracing::warn!(error = %err, "Verification lookup failed, treating as unverified");
                false
            }
        };
        if verified {
            if let Err(err) = self.db.set_user_verified(&user.email).await {
                tracing::warn!(error = %err, "Failed to persist verification flag");
            }
        }

        self.prefs
            .update(&user.uid, |p| {
                p.stay_connected = req.stay_connected;
                p.user_email = Some(user.email.clone());
            })
            .await;

        let session = self
            .sessions
            .create(&user.uid, &user.email, &user.id_token, verified)
            .await;
        let step = self.evaluate(&session).await;
        if matches!(step, OnboardingStep::AwaitingVerification) {
            self.spawn_verification_poller(&session).await;
        }

        tracing::info!(email = %session.email, ?step, "Signed in");
        Ok((session, step))
    }

    // ─── Step evaluation ─────────────────────────────────────────

    /// Route a signed-in user: verification, patient record, active device.
    ///
    /// Persists the carried patient id when routing to pairing and the
    /// completion flag when the flow is done, mirroring what each step
    /// needs from the preference cache later.
    pub async fn evaluate(&self, session: &Session) -> OnboardingStep {
        if !session.is_verified() {
            return OnboardingStep::AwaitingVerification;
        }

        let patient_id = match self.db.get_patient_for_user(&session.uid).await {
            Ok(patient) => patient.and_then(|p| p.id),
            Err(err) => {
                tracing::warn!(error = %err, "Patient lookup failed, routing to patient info");
                None
            }
        };
        let Some(patient_id) = patient_id else {
            return OnboardingStep::NeedsPatientInfo;
        };

        let device_active = match self.db.get_active_device_for_user(&session.uid).await {
            Ok(device) => device.is_some(),
            Err(err) => {
                tracing::warn!(error = %err, "Device lookup failed, routing to pairing");
                false
            }
        };

        let step = next_step(true, Some(&patient_id), device_active);
        match &step {
            OnboardingStep::NeedsPairing { patient_id } => {
                let patient_id = patient_id.clone();
                self.prefs
                    .update(&session.uid, |p| p.patient_doc_id = Some(patient_id))
                    .await;
            }
            OnboardingStep::Ready => {
                self.prefs
                    .update(&session.uid, |p| p.pairing_complete = true)
                    .await;
            }
            _ => {}
        }
        step
    }

    // ─── Patient info ────────────────────────────────────────────

    /// Validate and store the patient record, then route to pairing.
    pub async fn save_patient_info(
        &self,
        session: &Session,
        req: PatientInfoRequest,
    ) -> Result<OnboardingStep, AppError> {
        let dob = validation::format_dob_digits(&req.dob);

        let mut fields = FieldErrors::new();
        validation::apply(&mut fields, "first_name", validation::check_required(&req.first_name));
        validation::apply(&mut fields, "last_name", validation::check_required(&req.last_name));
        validation::apply(&mut fields, "dob", validation::check_dob_dmy(&dob));
        let mut number_field = |name: &str, value: &str| match validation::parse_positive_number(value)
        {
            Ok(n) => n,
            Err(msg) => {
                fields.insert(name.to_string(), msg.to_string());
                0.0
            }
        };
        let weight = number_field("weight", &req.weight);
        let height = number_field("height", &req.height);
        if !fields.is_empty() {
            return Err(AppError::Validation(fields));
        }

        let patient = Patient {
            id: None,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            dob,
            weight,
            height,
            user_id: session.uid.clone(),
            email: session.email.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            pairing_code: None,
        };
        let created = self.db.insert_patient(&patient).await?;
        let patient_id = created
            .id
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("insert returned no document id")))?;

        self.prefs
            .update(&session.uid, |p| p.patient_doc_id = Some(patient_id.clone()))
            .await;

        tracing::info!(patient_id = %patient_id, "Patient record created");
        Ok(OnboardingStep::NeedsPairing { patient_id })
    }

    // ─── Pairing ─────────────────────────────────────────────────

    /// Bind a scanned wearable to the patient record.
    ///
    /// The QR payload is checked before anything touches the database.
    /// The three writes happen in order (patient, pairing code, device);
    /// a failure surfaces as-is and the client may simply retry.
    pub async fn pair_device(
        &self,
        session: &Session,
        req: PairRequest,
    ) -> Result<OnboardingStep, AppError> {
        let mut fields = FieldErrors::new();
        validation::apply(&mut fields, "code", validation::check_qr_payload(&req.code));
        validation::apply(&mut fields, "device_id", validation::check_required(&req.device_id));
        if !fields.is_empty() {
            return Err(AppError::Validation(fields));
        }

        let prefs = self.prefs.get(&session.uid).unwrap_or_default();
        let Some(patient_id) = prefs.patient_doc_id else {
            return Err(AppError::BadRequest("Patient record missing".to_string()));
        };

        let now = chrono::Utc::now().to_rfc3339();

        if let Err(err) = self.db.set_patient_pairing_code(&patient_id, &req.code).await {
            tracing::warn!(error = %err, "Failed to update patient");
            return Err(err);
        }

        let completion = PairingCode {
            status: PairingStatus::Completed,
            user_email: Some(session.email.clone()),
            user_id: Some(session.uid.clone()),
            paired_at: Some(now.clone()),
            setup_complete: true,
        };
        if let Err(err) = self.db.complete_pairing_code(&req.code, &completion).await {
            tracing::warn!(error = %err, "Pairing update failed");
            return Err(err);
        }

        let device = WearDevice {
            code: req.code.clone(),
            user_id: session.uid.clone(),
            user_email: session.email.clone(),
            status: DeviceStatus::Active,
            device_id: Some(req.device_id.clone()),
            device_model: req.device_model.clone(),
            os_version: req.os_version.clone(),
            command: None,
            heart_rate: None,
            last_updated: None,
            paired_at: Some(now.clone()),
            last_active: Some(now),
        };
        if let Err(err) = self.db.register_device(&req.code, &device).await {
            tracing::warn!(error = %err, "Device registration failed");
            return Err(err);
        }

        self.prefs
            .update(&session.uid, |p| {
                p.pairing_complete = true;
                p.pairing_code = Some(req.code.clone());
                p.wear_device_id = Some(req.device_id.clone());
                p.patient_doc_id = Some(patient_id.clone());
            })
            .await;

        tracing::info!(code = %req.code, "Wearable paired");
        Ok(OnboardingStep::Ready)
    }

    // ─── Verification ────────────────────────────────────────────

    /// Current verification state: live lookup while the session holds a
    /// credential token, stored profile flag otherwise.
    pub async fn verification_status(&self, uid: &str, email: &str) -> Result<bool, AppError> {
        if let Some(session) = self.sessions.get(uid) {
            match self.identity.lookup(&session.id_token).await {
                Ok(info) => {
                    if info.email_verified && !session.is_verified() {
                        session.set_verified(true);
                        if let Err(err) = self.db.set_user_verified(&session.email).await {
                            tracing::warn!(error = %err, "Failed to persist verification flag");
                        }
                    }
                    return Ok(info.email_verified);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Live verification lookup failed, using stored flag");
                }
            }
        }

        let user = self.db.get_user(email).await?;
        Ok(user.map(|u| u.is_verified).unwrap_or(false))
    }

    /// Resend the verification email for a signed-in session.
    pub async fn resend_verification(&self, uid: &str) -> Result<(), AppError> {
        let session = self.sessions.get(uid).ok_or(AppError::Unauthorized)?;
        self.identity
            .send_verification(&session.id_token)
            .await
            .map_err(map_token_error)
    }

    /// Spawn the 5 s poller that watches for the verification click.
    ///
    /// Stops itself once verified or when the session disappears; aborted
    /// on sign-out.
    async fn spawn_verification_poller(&self, session: &Arc<Session>) {
        let store = self.sessions.clone();
        let identity = self.identity.clone();
        let db = self.db.clone();
        let uid = session.uid.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(VERIFICATION_CHECK_INTERVAL);
            // The first tick of a tokio interval fires immediately; the
            // observed cadence starts one interval after sign-in.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(session) = store.get(&uid) else {
                    break;
                };
                match identity.lookup(&session.id_token).await {
                    Ok(info) if info.email_verified => {
                        session.set_verified(true);
                        if let Err(err) = db.set_user_verified(&session.email).await {
                            tracing::warn!(error = %err, "Failed to persist verification flag");
                        }
                        tracing::info!(email = %session.email, "Email verified");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(error = %err, "Verification poll failed");
                    }
                }
            }
        });
        session.set_poller(handle).await;
    }

    // ─── Password reset / sign-out / deletion ────────────────────

    /// Ask the credential store to send a password reset email.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, AppError> {
        if let Some(message) = validation::check_email(email) {
            return Err(AppError::field("email", message));
        }

        match self.identity.send_password_reset(email).await {
            Ok(()) => Ok(format!("Reset email sent to {}", email)),
            Err(err) if err.code().is_some() => {
                // The form shows one message regardless of which account
                // condition the store reported.
                tracing::debug!(error = %err, "Password reset rejected");
                Err(AppError::field("email", "Failed to send reset email"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Clear local state, then end the credential session.
    ///
    /// Preference keys are removed before the session is dropped so no
    /// pairing key survives the sign-out.
    pub async fn sign_out(&self, uid: &str) {
        self.prefs.clear(uid).await;
        self.sessions.end(uid).await;
        tracing::info!(uid = %uid, "Signed out");
    }

    /// Delete the credential account and clear local state.
    ///
    /// Stored documents are kept; only the credential and the local
    /// caches go away.
    pub async fn delete_account(&self, uid: &str) -> Result<(), AppError> {
        let session = self.sessions.get(uid).ok_or(AppError::Unauthorized)?;
        self.identity
            .delete_account(&session.id_token)
            .await
            .map_err(map_token_error)?;

        self.prefs.clear(uid).await;
        self.sessions.end(uid).await;
        tracing::info!(uid = %uid, "Account deleted");
        Ok(())
    }
}

/// Map a sign-up rejection onto the email field.
fn map_sign_up_error(err: IdentityError) -> AppError {
    match err.code() {
        Some(IdentityCode::EmailExists) => AppError::field("email", "Email already in use"),
        Some(_) => AppError::field("email", "Sign up failed"),
        None => err.into(),
    }
}

/// Map a sign-in rejection onto the form fields.
///
/// The credential store reports wrong-password and unknown-email with
/// distinct codes (or the merged INVALID_LOGIN_CREDENTIALS); anything
/// else is a service failure.
fn map_sign_in_error(err: IdentityError) -> AppError {
    match err.code() {
        Some(IdentityCode::InvalidPassword) => AppError::field("password", "Wrong password"),
        Some(
            IdentityCode::EmailNotFound
            | IdentityCode::InvalidLoginCredentials
            | IdentityCode::UserNotFound,
        ) => AppError::field("email", "Incorrect Account or Password"),
        _ => err.into(),
    }
}

/// An unusable stored token means the caller must re-authenticate.
fn map_token_error(err: IdentityError) -> AppError {
    match err.code() {
        Some(IdentityCode::InvalidIdToken | IdentityCode::UserNotFound) => AppError::InvalidToken,
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unverified_always_awaits_verification() {
        assert_eq!(
            next_step(false, Some("p-1"), true),
            OnboardingStep::AwaitingVerification
        );
        assert_eq!(next_step(false, None, false), OnboardingStep::AwaitingVerification);
    }

    #[test]
    fn test_missing_patient_routes_to_patient_info() {
        assert_eq!(next_step(true, None, false), OnboardingStep::NeedsPatientInfo);
        // A stale active device must not skip the patient step.
        assert_eq!(next_step(true, None, true), OnboardingStep::NeedsPatientInfo);
    }

    #[test]
    fn test_patient_without_device_routes_to_pairing() {
        assert_eq!(
            next_step(true, Some("p-1"), false),
            OnboardingStep::NeedsPairing {
                patient_id: "p-1".to_string()
            }
        );
    }

    #[test]
    fn test_patient_with_active_device_is_ready() {
        assert_eq!(next_step(true, Some("p-1"), true), OnboardingStep::Ready);
    }

    #[test]
    fn test_step_serialization_tags() {
        assert_eq!(
            serde_json::to_value(OnboardingStep::AwaitingVerification).unwrap(),
            serde_json::json!({ "step": "awaiting_verification" })
        );
        assert_eq!(
            serde_json::to_value(OnboardingStep::NeedsPairing {
                patient_id: "p-1".to_string()
            })
            .unwrap(),
            serde_json::json!({ "step": "needs_pairing", "patient_id": "p-1" })
        );
    }

    fn api_error(code: IdentityCode) -> IdentityError {
        IdentityError::Api {
            code,
            message: "CODE".to_string(),
        }
    }

    #[test]
    fn test_sign_in_error_field_mapping() {
        let err = map_sign_in_error(api_error(IdentityCode::InvalidPassword));
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields.get("password").map(String::as_str), Some("Wrong password"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        for code in [
            IdentityCode::EmailNotFound,
            IdentityCode::InvalidLoginCredentials,
        ] {
            let err = map_sign_in_error(api_error(code));
            match err {
                AppError::Validation(fields) => {
                    assert_eq!(
                        fields.get("email").map(String::as_str),
                        Some("Incorrect Account or Password")
                    );
                }
                other => panic!("expected validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_sign_in_service_failures_are_not_field_errors() {
        let err = map_sign_in_error(IdentityError::Transport("timeout".to_string()));
        assert!(matches!(err, AppError::Identity(_)));

        let err = map_sign_in_error(api_error(IdentityCode::TooManyAttempts));
        assert!(matches!(err, AppError::Identity(_)));
    }

    #[test]
    fn test_sign_up_error_mapping() {
        let err = map_sign_up_error(api_error(IdentityCode::EmailExists));
        match err {
            AppError::Validation(fields) => {
                assert_eq!(
                    fields.get("email").map(String::as_str),
                    Some("Email already in use")
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let err = map_sign_up_error(api_error(IdentityCode::Other));
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields.get("email").map(String::as_str), Some("Sign up failed"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_token_maps_to_invalid_token() {
        let err = map_token_error(api_error(IdentityCode::InvalidIdToken));
        assert!(matches!(err, AppError::InvalidToken));
    }
}
