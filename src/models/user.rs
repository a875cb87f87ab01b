//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
///
/// Keyed by email address in the `users` collection. Field names are
/// camelCase on the wire to match the deployed schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Email address (also used as document ID)
    pub email: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Date of birth as entered at sign-up (MM/DD/YYYY)
    pub dob: String,
    /// Phone number
    pub phone: String,
    /// Credential store account id
    pub uid: String,
    /// Whether the email address has been verified
    #[serde(default)]
    pub is_verified: bool,
    /// When the account was created (RFC3339)
    pub created_at: String,
}
