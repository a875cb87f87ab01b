//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PATIENTS: &str = "patients";
    pub const PAIRING_CODES: &str = "pairingCodes";
    pub const WEAR_DEVICES: &str = "wearDevices";
    pub const MEASUREMENTS: &str = "heartRateMeasurements";
    /// Written by the wearable firmware, hence the divergent snake_case name.
    pub const READINGS: &str = "heart_rate_readings";
}
