// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patient demographics captured during onboarding.

use serde::{Deserialize, Serialize};

/// Patient record in the `patients` collection.
///
/// Documents use Firestore-generated ids; the id is captured back into the
/// struct on insert via the `_firestore_id` alias. `pairingCode` is absent
/// until a wearable is paired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(alias = "_firestore_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth as captured on the patient form (DD/MM/YYYY)
    pub dob: String,
    /// Weight in kilograms
    pub weight: f64,
    /// Height in centimeters
    pub height: f64,
    /// Credential store account id of the owning user
    pub user_id: String,
    /// Owning user's email
    pub email: String,
    /// When the record was created (RFC3339)
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
}

/// Field-masked patch that attaches a pairing code to a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPairingUpdate {
    pub pairing_code: String,
}
