// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error-to-response mapping tests.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use healthos_companion::error::{AppError, FieldErrors};

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_not_paired_names_the_fix() {
    let (status, body) = render(AppError::NotPaired).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_paired");
    assert_eq!(
        body["details"],
        "Device not paired. Please pair your watch first."
    );
}

#[tokio::test]
async fn test_validation_carries_field_messages() {
    let mut fields = FieldErrors::new();
    fields.insert("email".to_string(), "Email is required".to_string());
    fields.insert("dob".to_string(), "Use DD/MM/YYYY".to_string());

    let (status, body) = render(AppError::Validation(fields)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["fields"]["email"], "Email is required");
    assert_eq!(body["fields"]["dob"], "Use DD/MM/YYYY");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_field_helper_builds_single_entry() {
    let (status, body) = render(AppError::field("password", "Wrong password")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["password"], "Wrong password");
    assert_eq!(body["fields"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_index_surfaces_hint() {
    let hint = "heart_rate_readings requires a composite index".to_string();
    let (status, body) = render(AppError::MissingIndex(hint)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "missing_index");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("composite index"));
}

#[tokio::test]
async fn test_identity_failure_is_bad_gateway() {
    let (status, body) = render(AppError::Identity("connection refused".to_string())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "identity_error");
}

#[tokio::test]
async fn test_auth_errors_are_401() {
    let (status, body) = render(AppError::Unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = render(AppError::InvalidToken).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_database_error_does_not_leak_details() {
    let (status, body) =
        render(AppError::Database("grpc: connection to 10.0.0.3 refused".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "database_error");
    assert!(body.get("details").is_none());
}
