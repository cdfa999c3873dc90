//! Stub GoTrue-style auth server for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use lift_rooms::config::AuthConfig;

pub const API_KEY: &str = "anon-test-key";
pub const PASSWORD: &str = "correct-horse";
pub const TOKEN: &str = "tok-eve";

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn user_json() -> Value {
    json!({
        "id": "user-eve",
        "email": "eve.adams@example.com",
        "email_confirmed_at": "2026-01-02T03:04:05Z",
        "created_at": "2026-01-02T03:04:05Z",
        "last_sign_in_at": "2026-01-02T03:04:05Z",
        "user_metadata": {"full_name": "Eve Adams"}
    })
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(API_KEY)
}

fn has_token(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {TOKEN}");
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

async fn token(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if !has_api_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "No API key found"}))).into_response();
    }
    if query.get("grant_type").map(String::as_str) != Some("password") || body["password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        )
            .into_response();
    }
    Json(json!({"access_token": TOKEN, "token_type": "bearer", "user": user_json()})).into_response()
}

async fn current_user(headers: HeaderMap) -> Response {
    if !has_token(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))).into_response();
    }
    Json(user_json()).into_response()
}

async fn update_user(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !has_token(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))).into_response();
    }
    if body["password"] == PASSWORD {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"msg": "New password should be different from the old password."})),
        )
            .into_response();
    }
    Json(user_json()).into_response()
}

async fn signup(Json(body): Json<Value>) -> Response {
    Json(json!({
        "id": "user-new",
        "email": body["email"],
        "user_metadata": body["data"],
    }))
    .into_response()
}

async fn recover(Json(body): Json<Value>) -> Response {
    if body["email"] == "boom@example.com" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"msg": "database unavailable"})))
            .into_response();
    }
    Json(json!({})).into_response()
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Start the stub on a random port and return a config pointing at it.
pub async fn start_auth_server() -> AuthConfig {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/user", get(current_user).put(update_user))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/recover", post(recover))
        .route("/auth/v1/logout", post(logout));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    AuthConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        api_key: API_KEY.to_string().into(),
    }
}
