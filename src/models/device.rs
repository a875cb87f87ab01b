// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable device and pairing code documents.
//!
//! The `wearDevices/{code}` document is the shared channel between the phone
//! side and the wearable: the phone writes `command`, the wearable writes
//! `status` and `heartRate`. All phone-side mutations are field-masked
//! patches so concurrent wearable writes are never clobbered whole-document.

use serde::{Deserialize, Serialize};

/// Lifecycle of a pairing code document (`pairingCodes/{code}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingStatus {
    Pending,
    Completed,
}

/// Pairing code document, keyed by the code itself.
///
/// Created out of band when a wearable is provisioned; the companion service
/// only completes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCode {
    pub status: PairingStatus,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub paired_at: Option<String>,
    #[serde(default)]
    pub setup_complete: bool,
}

/// The single `status` field of a wearable document.
///
/// The deployed schema uses one field for both the device lifecycle
/// (`active`/`inactive`) and the measurement session (`measuring`/`idle`).
/// The onboarding "active device" query matches `active` only, so a device
/// that is mid-session does not count as active there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Measuring,
    Idle,
}

impl DeviceStatus {
    /// Wire value of the onboarding "active device" filter.
    pub const ACTIVE_VALUE: &'static str = "active";
}

/// Phone-side command written onto the device document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCommand {
    StartMeasurement,
    StopMeasurement,
}

/// Wearable document in `wearDevices`, keyed by pairing code.
///
/// `PartialEq` drives change detection in the device watcher: the wearable
/// bumps `lastUpdated` on every report, so every wearable write compares
/// unequal to the previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearDevice {
    pub code: String,
    pub user_id: String,
    pub user_email: String,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<DeviceCommand>,
    /// Latest heart rate reported by the wearable (bpm)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
}

/// Field-masked patch for starting/stopping a measurement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCommandUpdate {
    pub command: DeviceCommand,
    pub status: DeviceStatus,
    pub last_updated: String,
}

impl DeviceCommandUpdate {
    pub fn start(now: String) -> Self {
        Self {
            command: DeviceCommand::StartMeasurement,
            status: DeviceStatus::Measuring,
            last_updated: now,
        }
    }

    pub fn stop(now: String) -> Self {
        Self {
            command: DeviceCommand::StopMeasurement,
            status: DeviceStatus::Idle,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(status: DeviceStatus, heart_rate: Option<u32>, updated: &str) -> WearDevice {
        WearDevice {
            code: "HEALTHOS-TEST1".to_string(),
            user_id: "uid-1".to_string(),
            user_email: "pat@example.com".to_string(),
            status,
            device_id: Some("wear-01".to_string()),
            device_model: None,
            os_version: None,
            command: None,
            heart_rate,
            last_updated: Some(updated.to_string()),
            paired_at: None,
            last_active: None,
        }
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(
            serde_json::to_value(DeviceStatus::Measuring).unwrap(),
            serde_json::json!("measuring")
        );
        assert_eq!(
            serde_json::to_value(DeviceCommand::StartMeasurement).unwrap(),
            serde_json::json!("start_measurement")
        );
    }

    #[test]
    fn test_repeated_report_with_new_timestamp_compares_unequal() {
        let first = device(DeviceStatus::Measuring, Some(72), "2026-08-25T10:00:00Z");
        let second = device(DeviceStatus::Measuring, Some(72), "2026-08-25T10:00:02Z");
        // Same rate, new lastUpdated: still a distinct snapshot event.
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }

    #[test]
    fn test_device_deserializes_with_missing_optionals() {
        let doc = serde_json::json!({
            "code": "HEALTHOS-TEST1",
            "userId": "uid-1",
            "userEmail": "pat@example.com",
            "status": "idle"
        });
        let device: WearDevice = serde_json::from_value(doc).unwrap();
        assert_eq!(device.status, DeviceStatus::Idle);
        assert_eq!(device.heart_rate, None);
    }
}
