// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use step_tracker::error::AppError;
use step_tracker::models::NewGroup;
use validator::Validate;

async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED, "unauthorized"),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid_token"),
        (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "forbidden"),
        (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
        (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
        (AppError::Conflict("x".into()), StatusCode::CONFLICT, "conflict"),
    ];

    for (err, status, code) in cases {
        let (actual_status, json) = body_json(err).await;
        assert_eq!(actual_status, status);
        assert_eq!(json["error"], code);
        assert_eq!(json["details"].as_str().is_some(), status != StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_internal_details_not_leaked() {
    let (status, json) = body_json(AppError::Database("connection string secret".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "database_error");
    assert!(json.get("details").is_none());

    let (status, json) = body_json(AppError::Internal(anyhow::anyhow!("boom"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal_error");
    assert!(json.get("details").is_none());
}

#[test]
fn test_validation_errors_become_bad_request() {
    let fields: NewGroup = serde_json::from_value(serde_json::json!({
        "name": "",
        "logoUrl": "not a url",
        "type": "community"
    }))
    .unwrap();

    let err: AppError = fields.validate().unwrap_err().into();
    match err {
        AppError::BadRequest(msg) => {
            assert!(msg.starts_with("Invalid fields: "), "{}", msg);
            assert!(msg.contains("name"), "{}", msg);
        }
        other => panic!("expected BadRequest, got {:?}", other),
    }
}
