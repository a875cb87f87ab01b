//! Heart-rate measurement rows and zone classification.

use serde::{Deserialize, Serialize};

/// Heart-rate zone bands used by the live measurement view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartRateZone {
    Low,
    Normal,
    High,
}

impl HeartRateZone {
    /// Classify a reading in beats per minute.
    ///
    /// Below 60 is low, above 100 is high; both 60 and 100 are normal.
    pub fn classify(bpm: u32) -> Self {
        if bpm < 60 {
            HeartRateZone::Low
        } else if bpm > 100 {
            HeartRateZone::High
        } else {
            HeartRateZone::Normal
        }
    }
}

/// Append-only measurement row in `heartRateMeasurements`.
///
/// Written fire-and-forget by the device watcher, one row per observed
/// wearable report. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateMeasurement {
    pub patient_id: String,
    pub user_email: String,
    pub heart_rate: u32,
    pub timestamp: String,
    pub device_id: String,
    pub source: String,
}

impl HeartRateMeasurement {
    pub const SOURCE_WEARABLE: &'static str = "wear_os_device";
}

/// Numeric wire value that may be stored as integer or floating point.
///
/// The wearable writer stores `averageHeartRate` inconsistently, so both
/// encodings appear in the same collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bpm {
    Int(i64),
    Float(f64),
}

impl Bpm {
    pub fn as_f64(self) -> f64 {
        match self {
            Bpm::Int(v) => v as f64,
            Bpm::Float(v) => v,
        }
    }
}

/// History row in `heart_rate_readings`.
///
/// Every field is optional on the wire; rows missing a timestamp or a
/// numeric value are skipped when the history series is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateReading {
    #[serde(default)]
    pub patient_email: Option<String>,
    #[serde(default)]
    pub pairing_code: Option<String>,
    #[serde(default)]
    pub average_heart_rate: Option<Bpm>,
    #[serde(default)]
    pub timestamp: Option<String>,
}
