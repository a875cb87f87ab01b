// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Identity Toolkit REST client.
//!
//! Wraps the `accounts:*` endpoints used for credential management:
//! sign-up, password sign-in, verification/reset emails, account lookup
//! and deletion. Errors carry the structured code from the API error body
//! so callers can map them onto form fields.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Structured error codes returned by the Identity Toolkit.
///
/// Newer API keys report `INVALID_LOGIN_CREDENTIALS` for both unknown
/// emails and wrong passwords; older keys report the split codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCode {
    EmailExists,
    EmailNotFound,
    InvalidPassword,
    InvalidLoginCredentials,
    UserDisabled,
    TooManyAttempts,
    InvalidIdToken,
    UserNotFound,
    Other,
}

impl IdentityCode {
    /// Parse the leading code token from an error message such as
    /// `"TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account ..."`.
    fn parse(message: &str) -> Self {
        match message.split_whitespace().next().unwrap_or("") {
            "EMAIL_EXISTS" => IdentityCode::EmailExists,
            "EMAIL_NOT_FOUND" => IdentityCode::EmailNotFound,
            "INVALID_PASSWORD" => IdentityCode::InvalidPassword,
            "INVALID_LOGIN_CREDENTIALS" => IdentityCode::InvalidLoginCredentials,
            "USER_DISABLED" => IdentityCode::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityCode::TooManyAttempts,
            "INVALID_ID_TOKEN" => IdentityCode::InvalidIdToken,
            "USER_NOT_FOUND" => IdentityCode::UserNotFound,
            _ => IdentityCode::Other,
        }
    }
}

/// Errors from the Identity Toolkit client.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Identity request failed: {0}")]
    Transport(String),

    #[error("Identity API error: {message}")]
    Api { code: IdentityCode, message: String },

    #[error("Identity response malformed: {0}")]
    Malformed(String),

    #[error("Identity client not connected (offline mode)")]
    Offline,
}

impl IdentityError {
    /// The structured API code, if this is an API rejection.
    pub fn code(&self) -> Option<IdentityCode> {
        match self {
            IdentityError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        AppError::Identity(err.to_string())
    }
}

/// Credential established by `accounts:signUp` or
/// `accounts:signInWithPassword`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: String,
    pub id_token: String,
}

/// Account snapshot from `accounts:lookup`.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
}

/// Identity Toolkit REST client.
#[derive(Clone)]
pub struct IdentityClient {
    http: Option<reqwest::Client>,
    base_url: String,
    api_key: String,
}

impl IdentityClient {
    /// Create a client against the given base URL (override it to point
    /// at the auth emulator).
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create a disconnected client for testing (offline mode).
    ///
    /// Every call returns `IdentityError::Offline`.
    pub fn new_mock() -> Self {
        Self {
            http: None,
            base_url: String::new(),
            api_key: String::new(),
        }
    }

    /// Create a credential with email and password.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, IdentityError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true
        });
        let response: TokenResponse = self.post("signUp", &body).await?;
        Ok(AuthenticatedUser {
            uid: response.local_id,
            email: response.email,
            id_token: response.id_token,
        })
    }

    /// Check an email/password pair.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, IdentityError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true
        });
        let response: TokenResponse = self.post("signInWithPassword", &body).await?;
        Ok(AuthenticatedUser {
            uid: response.local_id,
            email: response.email,
            id_token: response.id_token,
        })
    }

    /// Send the verification email for the account behind an ID token.
    pub async fn send_verification(&self, id_token: &str) -> Result<(), IdentityError> {
        let body = serde_json::json!({
            "requestType": "VERIFY_EMAIL",
            "idToken": id_token
        });
        let _: serde_json::Value = self.post("sendOobCode", &body).await?;
        Ok(())
    }

    /// Send a password reset email.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let body = serde_json::json!({
            "requestType": "PASSWORD_RESET",
            "email": email
        });
        let _: serde_json::Value = self.post("sendOobCode", &body).await?;
        Ok(())
    }

    /// Look up the account behind an ID token.
    ///
    /// This is the live read of the verification flag: it reflects a
    /// verification link clicked moments ago, which the stored profile
    /// flag may not.
    pub async fn lookup(&self, id_token: &str) -> Result<AccountInfo, IdentityError> {
        let body = serde_json::json!({ "idToken": id_token });
        let response: LookupResponse = self.post("lookup", &body).await?;
        let user = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Malformed("lookup returned no users".to_string()))?;
        Ok(AccountInfo {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
        })
    }

    /// Delete the account behind an ID token.
    pub async fn delete_account(&self, id_token: &str) -> Result<(), IdentityError> {
        let body = serde_json::json!({ "idToken": id_token });
        let _: serde_json::Value = self.post("delete", &body).await?;
        Ok(())
    }

    /// POST to an `accounts:{method}` endpoint and parse the JSON response.
    async fn post<B, T>(&self, method: &str, body: &B) -> Result<T, IdentityError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let http = self.http.as_ref().ok_or(IdentityError::Offline)?;
        let url = format!("{}/accounts:{}", self.base_url, method);

        let response = http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let raw = response.text().await.unwrap_or_default();
            let (code, message) = parse_api_error(status, &raw);
            tracing::debug!(%status, ?code, method, "Identity API call rejected");
            return Err(IdentityError::Api { code, message });
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Malformed(e.to_string()))
    }
}

/// Extract the structured code from an Identity Toolkit error body
/// (`{"error": {"message": "EMAIL_EXISTS"}}`).
fn parse_api_error(status: reqwest::StatusCode, body: &str) -> (IdentityCode, String) {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => {
            let code = IdentityCode::parse(&envelope.error.message);
            (code, envelope.error.message)
        }
        Err(_) => (IdentityCode::Other, format!("HTTP {}", status)),
    }
}
