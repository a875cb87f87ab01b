// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding workflow tests.
//!
//! The step evaluation is exercised against the Firestore emulator where
//! it needs real queries, and against the offline mock where the point is
//! that no query happens (short-circuit and fail-open branches).

use healthos_companion::db::FirestoreDb;
use healthos_companion::models::{DeviceStatus, PairingStatus};
use healthos_companion::prefs::PrefStore;
use healthos_companion::services::identity::IdentityClient;
use healthos_companion::services::onboarding::{
    OnboardingService, OnboardingStep, PairRequest, PatientInfoRequest,
};
use healthos_companion::session::SessionStore;

mod common;
use common::{test_db, test_db_offline};

fn unique_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

fn service_with(db: FirestoreDb, prefs: PrefStore, sessions: SessionStore) -> OnboardingService {
    OnboardingService::new(db, IdentityClient::new_mock(), prefs, sessions)
}

#[tokio::test]
async fn test_unverified_session_short_circuits_evaluation() {
    let prefs = PrefStore::in_memory();
    let sessions = SessionStore::new();
    let service = service_with(test_db_offline(), prefs, sessions.clone());

    let session = sessions.create("uid-1", "pat@example.com", "", false).await;

    // The offline mock fails every query, so reaching a verification
    // answer proves no query ran.
    let step = service.evaluate(&session).await;
    assert_eq!(step, OnboardingStep::AwaitingVerification);
}

#[tokio::test]
async fn test_failed_patient_lookup_falls_open_to_patient_info() {
    let prefs = PrefStore::in_memory();
    let sessions = SessionStore::new();
    let service = service_with(test_db_offline(), prefs, sessions.clone());

    let session = sessions.create("uid-1", "pat@example.com", "", true).await;

    // A verified session with a failing store routes toward redoing the
    // patient step rather than blocking sign-in.
    let step = service.evaluate(&session).await;
    assert_eq!(step, OnboardingStep::NeedsPatientInfo);
}

#[tokio::test]
async fn test_workflow_progression_to_ready() {
    require_emulator!();

    let db = test_db().await;
    let prefs = PrefStore::in_memory();
    let sessions = SessionStore::new();
    let service = service_with(db.clone(), prefs.clone(), sessions.clone());

    let n = unique_suffix();
    let uid = format!("uid-{}", n);
    let email = format!("pat-{}@example.com", n);
    let code = format!("HEALTHOS-T{}", n);

    let session = sessions.create(&uid, &email, "", true).await;

    // Verified, no patient record yet.
    let step = service.evaluate(&session).await;
    assert_eq!(step, OnboardingStep::NeedsPatientInfo);

    // Capture patient info; digits are masked into DD/MM/YYYY.
    let step = service
        .save_patient_info(
            &session,
            PatientInfoRequest {
                first_name: "Pat".to_string(),
                last_name: "Doe".to_string(),
                dob: "02011990".to_string(),
                weight: "72.5".to_string(),
                height: "178".to_string(),
            },
        )
        .await
        .unwrap();
    let OnboardingStep::NeedsPairing { patient_id } = step else {
        panic!("expected pairing step, got {:?}", step);
    };
    assert_eq!(
        prefs.get(&uid).unwrap().patient_doc_id,
        Some(patient_id.clone())
    );

    // Re-evaluation lands on the same step with the same patient.
    let step = service.evaluate(&session).await;
    assert_eq!(step, OnboardingStep::NeedsPairing { patient_id: patient_id.clone() });

    // Pair the wearable.
    let step = service
        .pair_device(
            &session,
            PairRequest {
                code: code.clone(),
                device_id: "wear-01".to_string(),
                device_model: Some("Galaxy Watch 6".to_string()),
                os_version: Some("Wear OS 4".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(step, OnboardingStep::Ready);

    // All pairing keys cached, completion flag set.
    let cached = prefs.get(&uid).unwrap();
    assert!(cached.pairing_complete);
    assert_eq!(cached.pairing_code, Some(code.clone()));
    assert_eq!(cached.wear_device_id, Some("wear-01".to_string()));
    assert_eq!(cached.patient_doc_id, Some(patient_id.clone()));

    // All three stored documents are in place.
    let patient = db.get_patient_for_user(&uid).await.unwrap().unwrap();
    assert_eq!(patient.pairing_code, Some(code.clone()));
    assert_eq!(patient.dob, "02/01/1990");

    let pairing = db.get_pairing_code(&code).await.unwrap().unwrap();
    assert_eq!(pairing.status, PairingStatus::Completed);
    assert!(pairing.setup_complete);
    assert_eq!(pairing.user_id, Some(uid.clone()));

    let device = db.get_device(&code).await.unwrap().unwrap();
    assert_eq!(device.status, DeviceStatus::Active);
    assert_eq!(device.device_model, Some("Galaxy Watch 6".to_string()));

    // With an active device the flow is done.
    let step = service.evaluate(&session).await;
    assert_eq!(step, OnboardingStep::Ready);

    println!("✓ Workflow progressed to ready: uid={}", uid);
}

#[tokio::test]
async fn test_pairing_without_patient_record_is_rejected() {
    require_emulator!();

    let db = test_db().await;
    let prefs = PrefStore::in_memory();
    let sessions = SessionStore::new();
    let service = service_with(db.clone(), prefs, sessions.clone());

    let n = unique_suffix();
    let uid = format!("uid-{}", n);
    let email = format!("pat-{}@example.com", n);
    let code = format!("HEALTHOS-T{}", n);

    let session = sessions.create(&uid, &email, "", true).await;

    let err = service
        .pair_device(
            &session,
            PairRequest {
                code: code.clone(),
                device_id: "wear-01".to_string(),
                device_model: None,
                os_version: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        healthos_companion::error::AppError::BadRequest(msg) if msg == "Patient record missing"
    ));

    // Nothing was written for this code.
    let device = db.get_device(&code).await.unwrap();
    assert!(device.is_none());

    println!("✓ Pairing rejected without patient record: uid={}", uid);
}
