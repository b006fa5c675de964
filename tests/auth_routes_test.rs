mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use bookstore_api::auth::Role;
use common::{response_json, TestApp, ADMIN_EMAIL};

#[tokio::test]
async fn register_returns_token_and_public_user() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "username": "reader", "email": "Reader@Books.io", "password": "secret123" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "User registered successfully");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["email"], "reader@books.io");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn allow_listed_email_registers_as_admin() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "username": "boss", "email": ADMIN_EMAIL, "password": "secret123" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = TestApp::new().await;
    app.register("reader", "reader@books.io").await;

    for (username, email) in [("other", "READER@books.io"), ("reader", "fresh@books.io")] {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/register",
                Some(json!({ "username": username, "email": email, "password": "secret123" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User with this email or username already exists");
    }
}

#[tokio::test]
async fn short_password_is_invalid() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "username": "reader", "email": "reader@books.io", "password": "123" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_outcomes() {
    let app = TestApp::new().await;
    app.register("reader", "reader@books.io").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "reader@books.io", "password": "secret123" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["token"].is_string());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "reader@books.io", "password": "wrong-pass" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid password");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "nobody@books.io", "password": "secret123" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn profile_requires_a_valid_token_for_an_existing_user() {
    let app = TestApp::new().await;
    let (token, id) = app.register("reader", "reader@books.io").await;

    let (status, body) = app.call(Method::GET, "/api/auth/profile", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.to_string());
    assert_eq!(body["user"]["username"], "reader");

    let (status, _) = app.call(Method::GET, "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut tampered = token.clone();
    tampered.push('x');
    let (status, body) = app
        .call(Method::GET, "/api/auth/profile", None, Some(&tampered))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid token");

    let ghost = app.token_for("ghost@books.io", Role::User);
    let (status, body) = app.call(Method::GET, "/api/auth/profile", None, Some(&ghost)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn root_and_health_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, "Book Store Server is running!");

    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"]["status"], "up");

    let response = app.request(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
