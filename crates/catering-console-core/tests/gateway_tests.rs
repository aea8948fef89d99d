//! Login, refresh and logout against a mock auth backend.

mod common;

use std::sync::Arc;

use catering_console_core::auth::{RefreshOutcome, SessionEvent};
use catering_console_core::{
    ApiError, AuthGateway, CredentialStore, Credentials, SessionRecord, SessionSignal,
};
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

#[tokio::test]
async fn test_login_writes_whole_session_and_signal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ops@sabores.cl", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("acc-1", "ref-1", 900)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let mut events = gateway.subscribe();

    let account = gateway
        .login(&Credentials::new("ops@sabores.cl", "hunter2"))
        .await
        .expect("login should succeed");
    assert_eq!(account, common::account());

    let record = gateway.store().read().expect("session stored");
    assert_eq!(record.access_token, "acc-1");
    assert_eq!(record.refresh_token, "ref-1");
    assert_eq!(record.account, common::account());
    let remaining = record.expires_at - Utc::now();
    assert!(remaining > Duration::seconds(890) && remaining <= Duration::seconds(900));

    assert!(gateway.store().is_authenticated());
    assert!(gateway.signal().is_present());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedIn { account_id: "c-1".to_string() }]
    );
}

#[tokio::test]
async fn test_rejected_login_changes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "statusCode": 401,
            "message": "Invalid email or password"
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let result = gateway.login(&Credentials::new("ops@sabores.cl", "wrong")).await;

    match result {
        Err(ApiError::InvalidCredentials { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("expected InvalidCredentials, got {:?}", other),
    }
    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
}

#[tokio::test]
async fn test_login_server_error_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let result = gateway.login(&Credentials::new("ops@sabores.cl", "hunter2")).await;
    assert!(matches!(result, Err(ApiError::Http { status: 503, .. })));
    assert!(gateway.store().read().is_none());
}

#[tokio::test]
async fn test_refresh_without_token_makes_no_network_call() {
    let server = MockServer::start().await;
    let gateway = gateway_for(&server);

    assert_eq!(gateway.refresh().await, None);
    assert_eq!(gateway.refresh_outcome().await, RefreshOutcome::NoRefreshToken);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_refresh_keeps_account_and_renews_signal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "ref-1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(refresh_body("acc-2", "ref-2", 1800)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    sign_in(&gateway, "acc-1", "ref-1");
    gateway.signal().clear().expect("clear");
    let mut events = gateway.subscribe();

    assert_eq!(gateway.refresh().await.as_deref(), Some("acc-2"));

    let record = gateway.store().read().expect("session kept");
    assert_eq!(record.access_token, "acc-2");
    assert_eq!(record.refresh_token, "ref-2");
    assert_eq!(record.account, common::account());
    assert!(record.expires_at - Utc::now() > Duration::seconds(1700));
    assert!(gateway.signal().is_present());
    assert_eq!(drain(&mut events), vec![SessionEvent::Refreshed]);
    assert!(!gateway.refresh_in_flight());
}

#[tokio::test]
async fn test_rejected_refresh_clears_everything() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    sign_in(&gateway, "acc-1", "ref-1");
    let mut events = gateway.subscribe();

    assert_eq!(
        gateway.refresh_outcome().await,
        RefreshOutcome::Rejected { status: 401 }
    );
    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
    assert_eq!(drain(&mut events), vec![SessionEvent::LoginRequired]);

    // The slot is free again; with no token left the next attempt is local
    assert_eq!(gateway.refresh_outcome().await, RefreshOutcome::NoRefreshToken);
}

#[tokio::test]
async fn test_refresh_network_failure_clears_everything() {
    let gateway = gateway_at(UNREACHABLE);
    sign_in(&gateway, "acc-1", "ref-1");

    let outcome = gateway.refresh_outcome().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
}

#[tokio::test]
async fn test_logout_revokes_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer acc-1"))
        .and(body_json(json!({"refreshToken": "ref-1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    sign_in(&gateway, "acc-1", "ref-1");
    let mut events = gateway.subscribe();

    gateway.logout().await;

    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedOut, SessionEvent::LoginRequired]
    );
}

#[tokio::test]
async fn test_logout_succeeds_locally_when_backend_unreachable() {
    let gateway = gateway_at(UNREACHABLE);
    sign_in(&gateway, "acc-1", "ref-1");
    let mut events = gateway.subscribe();

    gateway.logout().await;

    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
    assert!(drain(&mut events).contains(&SessionEvent::LoginRequired));
}

#[tokio::test]
async fn test_logout_ignores_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    sign_in(&gateway, "acc-1", "ref-1");
    gateway.logout().await;

    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
}

#[tokio::test]
async fn test_logout_without_session_skips_backend() {
    let server = MockServer::start().await;
    let gateway = gateway_for(&server);

    gateway.logout().await;

    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(gateway.store().read().is_none());
}

#[tokio::test]
async fn test_refresh_with_empty_refresh_token_ends_session() {
    let server = MockServer::start().await;
    let gateway = gateway_for(&server);
    sign_in(&gateway, "acc-1", "");
    let mut events = gateway.subscribe();

    assert_eq!(gateway.refresh_outcome().await, RefreshOutcome::NoRefreshToken);

    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(gateway.store().read().is_none());
    assert!(!gateway.signal().is_present());
    assert_eq!(drain(&mut events), vec![SessionEvent::LoginRequired]);
}

/// A state "directory" that is really a file: every signal write fails.
fn unwritable_signal(dir: &tempfile::TempDir) -> SessionSignal {
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").expect("write blocker file");
    SessionSignal::at(&blocker)
}

#[tokio::test]
async fn test_login_survives_signal_write_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("acc-1", "ref-1", 900)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let gateway = AuthGateway::new(
        reqwest::Client::new(),
        server.uri(),
        Arc::new(CredentialStore::in_memory()),
        Arc::new(unwritable_signal(&dir)),
    );
    let mut events = gateway.subscribe();

    let account = gateway
        .login(&Credentials::new("ops@sabores.cl", "hunter2"))
        .await
        .expect("store write decides the login");

    assert_eq!(account.id, "c-1");
    assert!(gateway.store().is_authenticated());
    assert!(!gateway.signal().is_present());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedIn { account_id: "c-1".to_string() }]
    );
}

#[tokio::test]
async fn test_logout_survives_signal_clear_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gateway = AuthGateway::new(
        reqwest::Client::new(),
        UNREACHABLE,
        Arc::new(CredentialStore::in_memory()),
        Arc::new(unwritable_signal(&dir)),
    );
    gateway
        .store()
        .write(SessionRecord::new("acc-1", "ref-1", 900, account()));

    gateway.logout().await;

    assert!(gateway.store().read().is_none());
}
