//! Per-user client preferences with best-effort file persistence.
//!
//! Holds the small key/value state each signed-in user carries between
//! sessions: the remembered email, the stay-connected flag, and the pairing
//! identifiers captured when a wearable was linked. Entries live in memory
//! and are flushed to a JSON file so they survive a restart. Persistence is
//! best-effort: a failed flush is logged and the in-memory state stays
//! authoritative.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stored preferences for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPrefs {
    pub stay_connected: bool,
    pub user_email: Option<String>,
    pub pairing_code: Option<String>,
    pub wear_device_id: Option<String>,
    pub patient_doc_id: Option<String>,
    pub pairing_complete: bool,
}

/// Preference store shared across requests, keyed by Firebase uid.
#[derive(Clone)]
pub struct PrefStore {
    path: Option<PathBuf>,
    entries: Arc<DashMap<String, SessionPrefs>>,
}

impl PrefStore {
    /// In-memory store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Load the store from a JSON file, starting empty if the file is
    /// missing or unreadable.
    ///
    /// Preferences are a convenience cache; a corrupt file must not keep
    /// the service from starting.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries: Arc<DashMap<String, SessionPrefs>> = Arc::new(DashMap::new());

        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, SessionPrefs>>(&raw) {
                Ok(stored) => {
                    for (uid, prefs) in stored {
                        entries.insert(uid, prefs);
                    }
                    tracing::info!(count = entries.len(), "Loaded stored preferences");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Preferences file is corrupt, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read preferences file, starting empty");
            }
        }

        Self {
            path: Some(path),
            entries,
        }
    }

    /// Get a copy of a user's preferences.
    pub fn get(&self, uid: &str) -> Option<SessionPrefs> {
        self.entries.get(uid).map(|p| p.clone())
    }

    /// Mutate a user's preferences (created as defaults first if absent)
    /// and flush.
    pub async fn update<F>(&self, uid: &str, mutate: F)
    where
        F: FnOnce(&mut SessionPrefs),
    {
        {
            let mut entry = self.entries.entry(uid.to_string()).or_default();
            mutate(&mut entry);
        }
        self.flush().await;
    }

    /// Drop all stored preferences for a user and flush.
    pub async fn clear(&self, uid: &str) {
        self.entries.remove(uid);
        self.flush().await;
    }

    /// Write the current entries to the backing file, if any.
    async fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };

        let snapshot: BTreeMap<String, SessionPrefs> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize preferences");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(path, json).await {
            tracing::warn!(error = %e, path = %path.display(), "Failed to write preferences file");
        }
    }
}
