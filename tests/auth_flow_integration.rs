//! Integration tests for the account lifecycle
//!
//! Drives the full router in-process against a throwaway SQLite file, reading
//! reset links back out of an in-memory mailer the way a user would read them
//! from their inbox.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use helyx_backend::{
    api::create_router,
    auth::{AuthDb, AuthState, UserStore},
    config::AuthConfig,
    email::{MemoryMailer, Notifier, NotifierConfig},
};

struct TestApp {
    router: Router,
    state: AuthState,
    mailer: Arc<MemoryMailer>,
    db_path: String,
    _dir: TempDir,
}

fn spawn_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("auth.db").to_string_lossy().to_string();

    let config = AuthConfig {
        jwt_secret: "integration-secret-0123456789abcdef".to_string(),
        db_path: db_path.clone(),
        session_ttl: Duration::days(7),
        reset_ttl: Duration::minutes(60),
        bcrypt_cost: 4,
        cookie_secure: true,
        frontend_url: "https://helyx.test".to_string(),
        email_send_timeout: StdDuration::from_secs(5),
    };

    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::spawn(
        mailer.clone(),
        NotifierConfig {
            frontend_url: config.frontend_url.clone(),
            reset_ttl_minutes: config.reset_ttl.num_minutes(),
            send_timeout: config.email_send_timeout,
        },
    );

    let db = AuthDb::open(&db_path).unwrap();
    let state = AuthState::new(&config, db, notifier).unwrap();

    TestApp {
        router: create_router(state.clone(), None),
        state,
        mailer,
        db_path,
        _dir: dir,
    }
}

async fn call(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

/// Wait for the background worker and pull the token out of the newest reset email
async fn reset_token_from_inbox(app: &TestApp, to: &str, expected_count: usize) -> String {
    for _ in 0..200 {
        let resets: Vec<_> = app
            .mailer
            .sent()
            .into_iter()
            .filter(|m| m.to == to && m.html.contains("reset-password.html?token="))
            .collect();
        if resets.len() >= expected_count {
            let html = &resets[expected_count - 1].html;
            let start = html.find("token=").unwrap() + "token=".len();
            return html[start..start + 64].to_string();
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("reset email for {} never arrived", to);
}

#[tokio::test]
async fn test_register_login_forgot_reset_scenario() {
    let app = spawn_app();

    // register
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "alice@example.com",
            "password": "Passw0rd!",
            "firstName": "Alice",
            "lastName": "Liddell",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // profile with the fresh session
    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["firstName"], "Alice");

    // wrong password
    let (status, body) = login(&app, "alice@example.com", "WrongPass1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    // forgot password creates exactly one unused row
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "If an account exists with that email, a reset link has been sent"
    );

    let account = app
        .state
        .users
        .find_active_by_email("alice@example.com")
        .unwrap()
        .unwrap();
    let rows = app.state.resets.tokens_for_account(&account.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].used);

    let reset_token = reset_token_from_inbox(&app, "alice@example.com", 1).await;
    assert_eq!(reset_token, rows[0].token);

    // reset
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": reset_token, "newPassword": "NewPass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body.get("token").is_none());

    // new password works, old one does not
    let (status, body) = login(&app, "alice@example.com", "NewPass1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged in successfully");

    let (status, _) = login(&app, "alice@example.com", "Passw0rd!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // replaying the link fails
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": reset_token, "newPassword": "Another1A" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_second_forgot_request_invalidates_first_link() {
    let app = spawn_app();
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "bob@example.com", "password": "Passw0rd!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for _ in 0..2 {
        let (status, _) = call(
            &app,
            "POST",
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "BOB@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let first = reset_token_from_inbox(&app, "bob@example.com", 1).await;
    let second = reset_token_from_inbox(&app, "bob@example.com", 2).await;
    assert_ne!(first, second);

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": first, "newPassword": "NewPass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "This reset link is invalid or has expired. Please request a new one."
    );

    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": second, "newPassword": "NewPass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_deactivation_locks_out_live_sessions() {
    let app = spawn_app();
    let (_, body) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "carol@example.com", "password": "Passw0rd!" })),
    )
    .await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // operator tooling opens its own handle on the same file
    let operator = UserStore::new(AuthDb::open(&app.db_path).unwrap());
    assert!(operator.set_active("carol@example.com", false).unwrap());

    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account not found or deactivated");

    // deactivated accounts cannot sign in either, and look like unknown ones
    let (status, body) = login(&app, "carol@example.com", "Passw0rd!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    // the email stays taken
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "Carol@Example.com", "password": "Passw0rd!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_welcome_email_is_sent_on_register() {
    let app = spawn_app();
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "dave@example.com", "password": "Passw0rd!", "firstName": "Dave" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for _ in 0..200 {
        if let Some(mail) = app.mailer.sent().into_iter().find(|m| m.to == "dave@example.com") {
            assert!(mail.html.contains("Welcome, Dave!"));
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("welcome email never arrived");
}
