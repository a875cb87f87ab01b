// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory session registry.
//!
//! A session is created at sign-up or sign-in and owns the per-user pieces
//! that do not belong in Firestore: the Firebase ID token, the verification
//! flag, the live measurement view, and the handles of the two background
//! tasks (verification poller and device watcher). Ending a session aborts
//! both tasks.

use crate::models::HeartRateZone;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Live measurement view for one session.
///
/// Updated by the device watcher from wearable snapshots and read by the
/// current-measurement endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementState {
    pub is_measuring: bool,
    pub heart_rate: Option<u32>,
    pub zone: Option<HeartRateZone>,
    /// When the last observation arrived (RFC3339)
    pub updated_at: Option<String>,
}

/// One signed-in user.
pub struct Session {
    pub uid: String,
    pub email: String,
    /// Firebase ID token captured at sign-in, used for live account lookups.
    /// Expires server-side; lookups fall back to the stored profile flag.
    pub id_token: String,
    verified: AtomicBool,
    measurement: RwLock<MeasurementState>,
    poller: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn new(uid: String, email: String, id_token: String, verified: bool) -> Self {
        Self {
            uid,
            email,
            id_token,
            verified: AtomicBool::new(verified),
            measurement: RwLock::new(MeasurementState::default()),
            poller: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Relaxed)
    }

    pub fn set_verified(&self, verified: bool) {
        self.verified.store(verified, Ordering::Relaxed);
    }

    /// Snapshot of the live measurement state.
    pub async fn measurement(&self) -> MeasurementState {
        self.measurement.read().await.clone()
    }

    /// Mutate the live measurement state.
    pub async fn update_measurement<F>(&self, mutate: F)
    where
        F: FnOnce(&mut MeasurementState),
    {
        let mut state = self.measurement.write().await;
        mutate(&mut state);
    }

    /// Attach the verification poller, aborting any previous one.
    pub async fn set_poller(&self, handle: JoinHandle<()>) {
        if let Some(old) = self.poller.lock().await.replace(handle) {
            old.abort();
        }
    }

    /// Detach and abort the verification poller.
    pub async fn stop_poller(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
    }

    /// Attach the device watcher, aborting any previous one.
    pub async fn set_watcher(&self, handle: JoinHandle<()>) {
        if let Some(old) = self.watcher.lock().await.replace(handle) {
            old.abort();
        }
    }

    /// Whether a device watcher is attached and still running.
    pub async fn watcher_active(&self) -> bool {
        self.watcher
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Detach and abort the device watcher.
    pub async fn stop_watcher(&self) {
        if let Some(handle) = self.watcher.lock().await.take() {
            handle.abort();
        }
    }

    /// Abort every background task attached to this session.
    pub async fn abort_tasks(&self) {
        self.stop_poller().await;
        self.stop_watcher().await;
    }
}

/// Session registry shared across requests, keyed by Firebase uid.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a user, ending any existing one first.
    pub async fn create(
        &self,
        uid: &str,
        email: &str,
        id_token: &str,
        verified: bool,
    ) -> Arc<Session> {
        if let Some((_, old)) = self.sessions.remove(uid) {
            old.abort_tasks().await;
        }

        let session = Arc::new(Session::new(
            uid.to_string(),
            email.to_string(),
            id_token.to_string(),
            verified,
        ));
        self.sessions.insert(uid.to_string(), session.clone());
        session
    }

    pub fn get(&self, uid: &str) -> Option<Arc<Session>> {
        self.sessions.get(uid).map(|s| s.clone())
    }

    /// Abort background tasks and drop the session.
    ///
    /// Returns whether a session existed.
    pub async fn end(&self, uid: &str) -> bool {
        match self.sessions.remove(uid) {
            Some((_, session)) => {
                session.abort_tasks().await;
                true
            }
            None => false,
        }
    }
}
