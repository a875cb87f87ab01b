// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Measurement route pairing-guard tests.
//!
//! Every measurement route needs the cached pairing keys; a signed-in
//! user who never paired (or reinstalled) gets the not-paired error from
//! all of them, even when the backend would know of an active device.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn request(
    app: axum::Router,
    method: Method,
    uri: &str,
    token: &str,
) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_all_measurement_routes_require_pairing_keys() {
    let (_, state) = common::create_test_app();
    let token = common::create_test_jwt("uid-1", "pat@example.com", &state.config.jwt_signing_key);

    let routes = [
        (Method::POST, "/measurement/session"),
        (Method::DELETE, "/measurement/session"),
        (Method::POST, "/measurement/start"),
        (Method::POST, "/measurement/stop"),
        (Method::GET, "/measurement/current"),
    ];

    for (method, uri) in routes {
        let (app, _) = common::create_test_app();
        let response = request(app, method.clone(), uri, &token).await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{} {} should report not paired",
            method,
            uri
        );

        let body = body_json(response).await;
        assert_eq!(body["error"], "not_paired", "{} {}", method, uri);
        assert_eq!(
            body["details"],
            "Device not paired. Please pair your watch first."
        );
    }
}

#[tokio::test]
async fn test_partial_pairing_keys_still_count_as_unpaired() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("uid-1", "pat@example.com", &state.config.jwt_signing_key);

    // A pairing code without the device and patient ids is not enough.
    state
        .prefs
        .update("uid-1", |p| {
            p.pairing_code = Some("HEALTHOS-ABC123".to_string());
        })
        .await;

    let response = request(app, Method::GET, "/measurement/current", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "not_paired");
}

#[tokio::test]
async fn test_current_measurement_with_keys_returns_session_mirror() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("uid-1", "pat@example.com", &state.config.jwt_signing_key);

    state
        .prefs
        .update("uid-1", |p| {
            p.pairing_code = Some("HEALTHOS-ABC123".to_string());
            p.wear_device_id = Some("wear-01".to_string());
            p.patient_doc_id = Some("p-1".to_string());
            p.pairing_complete = true;
        })
        .await;

    let response = request(app, Method::GET, "/measurement/current", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["is_measuring"], false);
    assert!(body["heart_rate"].is_null());
    assert!(body["zone"].is_null());
}

#[tokio::test]
async fn test_close_session_without_open_is_a_noop() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("uid-1", "pat@example.com", &state.config.jwt_signing_key);

    state
        .prefs
        .update("uid-1", |p| {
            p.pairing_code = Some("HEALTHOS-ABC123".to_string());
            p.wear_device_id = Some("wear-01".to_string());
            p.patient_doc_id = Some("p-1".to_string());
        })
        .await;

    let response = request(app, Method::DELETE, "/measurement/session", &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
