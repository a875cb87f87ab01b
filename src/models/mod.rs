// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod device;
pub mod patient;
pub mod reading;
pub mod user;

pub use device::{DeviceCommand, DeviceCommandUpdate, DeviceStatus, PairingCode, PairingStatus, WearDevice};
pub use patient::{Patient, PatientPairingUpdate};
pub use reading::{Bpm, HeartRateMeasurement, HeartRateReading, HeartRateZone};
pub use user::User;
