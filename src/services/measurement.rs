// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Measurement session controller.
//!
//! Commands the paired wearable through its shared document and mirrors
//! what the wearable reports back. A background watcher polls the device
//! document and feeds snapshots through a single reconciliation function;
//! the document is the authority on whether a measurement is running, and
//! every reported heart rate is appended as a measurement row.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{
    DeviceCommandUpdate, DeviceStatus, HeartRateMeasurement, HeartRateZone, WearDevice,
};
use crate::prefs::{PrefStore, SessionPrefs};
use crate::session::{MeasurementState, Session, SessionStore};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Poll interval of the device watcher.
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pairing identifiers a measurement session needs from the preference
/// cache.
///
/// All three must be present; a fresh install reports "not paired" even
/// when the backend knows of an active device, and has to pair again.
#[derive(Debug, Clone)]
pub struct PairingKeys {
    pub pairing_code: String,
    pub wear_device_id: String,
    pub patient_doc_id: String,
}

impl PairingKeys {
    pub fn from_prefs(prefs: Option<&SessionPrefs>) -> Result<Self, AppError> {
        let prefs = prefs.ok_or(AppError::NotPaired)?;
        match (&prefs.pairing_code, &prefs.wear_device_id, &prefs.patient_doc_id) {
            (Some(code), Some(device), Some(patient))
                if !code.is_empty() && !device.is_empty() && !patient.is_empty() =>
            {
                Ok(Self {
                    pairing_code: code.clone(),
                    wear_device_id: device.clone(),
                    patient_doc_id: patient.clone(),
                })
            }
            _ => Err(AppError::NotPaired),
        }
    }
}

/// Outcome of reconciling the local flag with a device snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// New value for the measuring flag when the document disagreed.
    pub corrected_to: Option<bool>,
    /// Heart rate carried by the snapshot, if any.
    pub observation: Option<u32>,
}

/// Compare a device snapshot against the local measuring flag.
///
/// Every snapshot carrying a heart rate yields an observation, repeated
/// identical values included; there is no de-duplication.
pub fn reconcile(is_measuring: bool, doc: &WearDevice) -> Reconciliation {
    let doc_measuring = doc.status == DeviceStatus::Measuring;
    Reconciliation {
        corrected_to: (doc_measuring != is_measuring).then_some(doc_measuring),
        observation: doc.heart_rate,
    }
}

/// Stream of device document snapshots, one item per observed change.
///
/// Polls `wearDevices/{code}` on a fixed interval and yields whenever the
/// fetched document differs from the last yielded one; the wearable bumps
/// `lastUpdated` on every report, so every wearable write produces an
/// event. Read errors are logged and skipped; a missing document yields
/// nothing.
pub fn device_events(db: FirestoreDb, code: String) -> impl Stream<Item = WearDevice> {
    struct PollState {
        db: FirestoreDb,
        code: String,
        interval: tokio::time::Interval,
        last: Option<WearDevice>,
    }

    let mut interval = tokio::time::interval(DEVICE_POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    futures_util::stream::unfold(
        PollState {
            db,
            code,
            interval,
            last: None,
        },
        |mut state| async move {
            loop {
                state.interval.tick().await;
                match state.db.get_device(&state.code).await {
                    Ok(Some(doc)) => {
                        if state.last.as_ref() == Some(&doc) {
                            continue;
                        }
                        state.last = Some(doc.clone());
                        return Some((doc, state));
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::warn!(error = %err, code = %state.code, "Device poll failed");
                        continue;
                    }
                }
            }
        },
    )
}

/// Measurement session service.
#[derive(Clone)]
pub struct MeasurementService {
    db: FirestoreDb,
    prefs: PrefStore,
    sessions: SessionStore,
}

impl MeasurementService {
    pub fn new(db: FirestoreDb, prefs: PrefStore, sessions: SessionStore) -> Self {
        Self {
            db,
            prefs,
            sessions,
        }
    }

    /// Pairing keys for a user, or "not paired".
    pub fn pairing_keys(&self, uid: &str) -> Result<PairingKeys, AppError> {
        let prefs = self.prefs.get(uid);
        PairingKeys::from_prefs(prefs.as_ref())
    }

    /// Open the measurement session: make sure the device watcher runs.
    ///
    /// Idempotent; reopening while a watcher is live keeps the existing
    /// one.
    pub async fn open(&self, session: &Arc<Session>, keys: &PairingKeys) -> MeasurementState {
        if !session.watcher_active().await {
            self.spawn_watcher(session, keys).await;
        }
        session.measurement().await
    }

    /// Close the measurement session.
    ///
    /// Stops the watcher and, if a measurement is still running, issues a
    /// best-effort stop so the wearable does not keep reporting into a
    /// dead session.
    pub async fn close(&self, session: &Arc<Session>, keys: &PairingKeys) {
        session.stop_watcher().await;

        let state = session.measurement().await;
        if state.is_measuring {
            session.update_measurement(|m| m.is_measuring = false).await;
            let update = DeviceCommandUpdate::stop(chrono::Utc::now().to_rfc3339());
            if let Err(err) = self.db.send_device_command(&keys.pairing_code, &update).await {
                tracing::warn!(error = %err, "Teardown stop failed");
            }
        }
    }

    /// Command the wearable to start measuring.
    pub async fn start(
        &self,
        session: &Session,
        keys: &PairingKeys,
    ) -> Result<MeasurementState, AppError> {
        self.command(session, keys, true).await
    }

    /// Command the wearable to stop measuring.
    pub async fn stop(
        &self,
        session: &Session,
        keys: &PairingKeys,
    ) -> Result<MeasurementState, AppError> {
        self.command(session, keys, false).await
    }

    /// Live measurement view from the session mirror.
    pub async fn current(&self, session: &Session) -> MeasurementState {
        session.measurement().await
    }

    /// Flip the measuring flag and patch the device document.
    ///
    /// Skips the patch when the flag already matches. A failed patch
    /// reverts the flag and surfaces the error; the caller may simply
    /// retry.
    async fn command(
        &self,
        session: &Session,
        keys: &PairingKeys,
        measuring: bool,
    ) -> Result<MeasurementState, AppError> {
        let mut already = false;
        session
            .update_measurement(|m| {
                if m.is_measuring == measuring {
                    already = true;
                } else {
                    m.is_measuring = measuring;
                }
            })
            .await;
        if already {
            return Ok(session.measurement().await);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let update = if measuring {
            DeviceCommandUpdate::start(now)
        } else {
            DeviceCommandUpdate::stop(now)
        };
        if let Err(err) = self.db.send_device_command(&keys.pairing_code, &update).await {
            tracing::warn!(error = %err, command = ?update.command, "Device command failed");
            session.update_measurement(|m| m.is_measuring = !measuring).await;
            return Err(err);
        }

        Ok(session.measurement().await)
    }

    /// Spawn the device watcher for a session.
    ///
    /// Consumes snapshot events, reconciles the local flag, and appends
    /// one measurement row per reported heart rate. The write is spawned
    /// fire-and-forget; a failure is logged and the stream moves on. The
    /// watcher stops itself when the session is gone and is aborted on
    /// sign-out.
    async fn spawn_watcher(&self, session: &Arc<Session>, keys: &PairingKeys) {
        let db = self.db.clone();
        let store = self.sessions.clone();
        let uid = session.uid.clone();
        let keys = keys.clone();

        let handle = tokio::spawn(async move {
            let mut events = std::pin::pin!(device_events(db.clone(), keys.pairing_code.clone()));
            while let Some(doc) = events.next().await {
                let Some(session) = store.get(&uid) else {
                    break;
                };

                let now = chrono::Utc::now().to_rfc3339();
                let mut outcome = Reconciliation::default();
                session
                    .update_measurement(|m| {
                        outcome = reconcile(m.is_measuring, &doc);
                        if let Some(corrected) = outcome.corrected_to {
                            m.is_measuring = corrected;
                        }
                        if let Some(bpm) = outcome.observation {
                            m.heart_rate = Some(bpm);
                            m.zone = Some(HeartRateZone::classify(bpm));
                            m.updated_at = Some(now.clone());
                        }
                    })
                    .await;

                if let Some(corrected) = outcome.corrected_to {
                    tracing::info!(corrected, "Measuring flag reconciled from device");
                }

                if let Some(bpm) = outcome.observation {
                    let row = HeartRateMeasurement {
                        patient_id: keys.patient_doc_id.clone(),
                        user_email: session.email.clone(),
                        heart_rate: bpm,
                        timestamp: now,
                        device_id: keys.wear_device_id.clone(),
                        source: HeartRateMeasurement::SOURCE_WEARABLE.to_string(),
                    };
                    let db = db.clone();
                    tokio::spawn(async move {
                        if let Err(err) = db.insert_measurement(&row).await {
                            tracing::warn!(error = %err, "Measurement save failed");
                        }
                    });
                }
            }
        });
        session.set_watcher(handle).await;
    }
}
