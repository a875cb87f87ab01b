// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, keyed by email)
//! - Patients (demographics, generated ids)
//! - Pairing codes and wearable devices (keyed by pairing code)
//! - Heart-rate measurements and history readings (append-only)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    DeviceCommandUpdate, DeviceStatus, HeartRateMeasurement, HeartRateReading, PairingCode,
    Patient, PatientPairingUpdate, User, WearDevice,
};
use firestore::{paths_camel_case, FirestoreQueryDirection};
use serde::{Deserialize, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user profile by email (the document id).
    pub async fn get_user(&self, email: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user profile.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.email)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Flip the verification flag on a user profile.
    ///
    /// Field-masked so concurrent profile edits are untouched.
    pub async fn set_user_verified(&self, email: &str) -> Result<(), AppError> {
        #[derive(Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct VerifiedFields {
            is_verified: bool,
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths_camel_case!(VerifiedFields::{is_verified}))
            .in_col(collections::USERS)
            .document_id(email)
            .object(&VerifiedFields { is_verified: true })
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Patient Operations ──────────────────────────────────────

    /// Get the patient record owned by a user, if any.
    ///
    /// The observed flows create at most one patient per user; the query
    /// mirrors that with `limit(1)`.
    pub async fn get_patient_for_user(&self, user_id: &str) -> Result<Option<Patient>, AppError> {
        let user_id = user_id.to_string();
        let mut patients: Vec<Patient> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PATIENTS)
            .filter(move |q| q.field("userId").eq(user_id.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(patients.pop())
    }

    /// Insert a patient with a generated document id.
    ///
    /// Returns the stored record with `id` populated.
    pub async fn insert_patient(&self, patient: &Patient) -> Result<Patient, AppError> {
        let created: Patient = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PATIENTS)
            .generate_document_id()
            .object(patient)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(created)
    }

    /// Attach a pairing code to an existing patient (field-masked).
    pub async fn set_patient_pairing_code(
        &self,
        patient_id: &str,
        code: &str,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths_camel_case!(PatientPairingUpdate::{pairing_code}))
            .in_col(collections::PATIENTS)
            .document_id(patient_id)
            .object(&PatientPairingUpdate {
                pairing_code: code.to_string(),
            })
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Pairing Code Operations ─────────────────────────────────

    /// Get a pairing code document.
    pub async fn get_pairing_code(&self, code: &str) -> Result<Option<PairingCode>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PAIRING_CODES)
            .obj()
            .one(code)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a pairing code completed (field-masked).
    pub async fn complete_pairing_code(
        &self,
        code: &str,
        completion: &PairingCode,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths_camel_case!(
                PairingCode::{status, user_email, user_id, paired_at, setup_complete}
            ))
            .in_col(collections::PAIRING_CODES)
            .document_id(code)
            .object(completion)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Wearable Device Operations ──────────────────────────────

    /// Get a wearable document by pairing code (the document id).
    pub async fn get_device(&self, code: &str) -> Result<Option<WearDevice>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WEAR_DEVICES)
            .obj()
            .one(code)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the user's active wearable, if any.
    ///
    /// Matches `status == "active"` only: a device mid-measurement reports
    /// `measuring` and deliberately does not satisfy this query.
    pub async fn get_active_device_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<WearDevice>, AppError> {
        let user_id = user_id.to_string();
        let mut devices: Vec<WearDevice> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WEAR_DEVICES)
            .filter(move |q| {
                q.for_all([
                    q.field("userId").eq(user_id.clone()),
                    q.field("status").eq(DeviceStatus::ACTIVE_VALUE),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(devices.pop())
    }

    /// Register (or re-register) a wearable document at pairing time.
    ///
    /// Whole-document write: pairing owns the device document until the
    /// wearable starts reporting.
    pub async fn register_device(&self, code: &str, device: &WearDevice) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WEAR_DEVICES)
            .document_id(code)
            .object(device)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write a start/stop command onto the device document.
    ///
    /// Field-masked to command/status/lastUpdated so the wearable's own
    /// fields (heartRate and metadata) survive the patch.
    pub async fn send_device_command(
        &self,
        code: &str,
        update: &DeviceCommandUpdate,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths_camel_case!(DeviceCommandUpdate::{command, status, last_updated}))
            .in_col(collections::WEAR_DEVICES)
            .document_id(code)
            .object(update)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Measurement Operations ──────────────────────────────────

    /// Append a heart-rate measurement row (generated id).
    pub async fn insert_measurement(
        &self,
        measurement: &HeartRateMeasurement,
    ) -> Result<(), AppError> {
        let _: HeartRateMeasurement = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::MEASUREMENTS)
            .generate_document_id()
            .object(measurement)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Fetch history readings for a patient/pairing pair, oldest first.
    pub async fn get_readings(
        &self,
        patient_email: &str,
        pairing_code: &str,
    ) -> Result<Vec<HeartRateReading>, AppError> {
        let patient_email = patient_email.to_string();
        let pairing_code = pairing_code.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::READINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("patientEmail").eq(patient_email.clone()),
                    q.field("pairingCode").eq(pairing_code.clone()),
                ])
            })
            .order_by([("timestamp", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(classify_readings_error)
    }
}

/// Map a readings query failure, surfacing the composite-index case.
///
/// Firestore rejects this filter+order combination with FAILED_PRECONDITION
/// mentioning "index" until the composite index exists.
fn classify_readings_error(err: firestore::errors::FirestoreError) -> AppError {
    let msg = err.to_string();
    if msg.to_lowercase().contains("index") {
        AppError::MissingIndex(format!(
            "{} requires a composite index on patientEmail, pairingCode, timestamp",
            collections::READINGS
        ))
    } else {
        AppError::Database(msg)
    }
}
