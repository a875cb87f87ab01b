//! Heart-rate history shaping.
//!
//! Fetches the ordered `heart_rate_readings` rows for a user and turns
//! them into chart points. Bad rows are skipped one by one with a logged
//! warning; indices stay consecutive over the surviving rows so the
//! horizontal axis remains chronological.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Bpm, HeartRateReading};
use crate::prefs::PrefStore;
use serde::Serialize;

/// One chart point of the history series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub index: usize,
    pub bpm: f64,
    /// Time label like "Aug 25 10:30"
    pub label: String,
}

/// Outcome classification of a history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Ok,
    NoData,
    NoValidData,
}

/// Shaped history series returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct HistorySeries {
    pub status: HistoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub points: Vec<HistoryPoint>,
    pub skipped: usize,
}

/// Shape fetched rows into a series.
///
/// Zero rows is a distinct outcome from rows that all fail row-level
/// checks; the client shows a different message for each.
pub fn build_series(rows: &[HeartRateReading]) -> HistorySeries {
    if rows.is_empty() {
        return HistorySeries {
            status: HistoryStatus::NoData,
            message: Some("No heart rate data available for this user".to_string()),
            points: Vec::new(),
            skipped: 0,
        };
    }

    let mut points = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let Some(ts) = row.timestamp.as_deref() else {
            tracing::warn!("Skipping reading without a timestamp");
            skipped += 1;
            continue;
        };
        let Some(bpm) = row.average_heart_rate else {
            tracing::warn!(timestamp = %ts, "Skipping reading without a heart rate");
            skipped += 1;
            continue;
        };
        let label = match chrono::DateTime::parse_from_rfc3339(ts) {
            Ok(when) => when.format("%b %d %H:%M").to_string(),
            Err(err) => {
                tracing::warn!(timestamp = %ts, error = %err, "Skipping reading with unparseable timestamp");
                skipped += 1;
                continue;
            }
        };
        points.push(HistoryPoint {
            index: points.len(),
            bpm: bpm.as_f64(),
            label,
        });
    }

    if points.is_empty() {
        return HistorySeries {
            status: HistoryStatus::NoValidData,
            message: Some("No valid heart rate data found".to_string()),
            points,
            skipped,
        };
    }

    HistorySeries {
        status: HistoryStatus::Ok,
        message: None,
        points,
        skipped,
    }
}

/// History query service.
#[derive(Clone)]
pub struct HistoryService {
    db: FirestoreDb,
    prefs: PrefStore,
}

impl HistoryService {
    pub fn new(db: FirestoreDb, prefs: PrefStore) -> Self {
        Self { db, prefs }
    }

    /// Fetch and shape the history series for a user.
    ///
    /// Needs the cached email and pairing code; without both there is
    /// nothing to query by.
    pub async fn series(&self, uid: &str) -> Result<HistorySeries, AppError> {
        let prefs = self.prefs.get(uid);
        let keys = prefs.as_ref().and_then(|p| {
            let email = p.user_email.as_deref().filter(|v| !v.is_empty())?;
            let code = p.pairing_code.as_deref().filter(|v| !v.is_empty())?;
            Some((email.to_string(), code.to_string()))
        });
        let Some((email, code)) = keys else {
            return Err(AppError::BadRequest("Missing required user data".to_string()));
        };

        let rows = self.db.get_readings(&email, &code).await?;
        Ok(build_series(&rows))
    }
}
