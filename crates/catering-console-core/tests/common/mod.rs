//! Shared fixtures for the HTTP-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use catering_console_core::auth::SessionEvent;
use catering_console_core::{
    Account, AuthGateway, CredentialStore, SessionRecord, SessionSignal,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use wiremock::MockServer;

/// Nothing listens here; connecting fails immediately.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub fn account_json() -> Value {
    json!({
        "id": "c-1",
        "name": "Sabores",
        "legalName": "Sabores SpA",
        "taxId": "76.123.456-7",
        "companyType": "CATERING",
        "status": "ACTIVE",
        "createdAt": "2025-01-01T00:00:00Z",
        "updatedAt": "2025-02-01T00:00:00Z"
    })
}

pub fn account() -> Account {
    serde_json::from_value(account_json()).expect("fixture account should parse")
}

pub fn login_body(access: &str, refresh: &str, expires_in: i64) -> Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "expiresIn": expires_in,
        "account": account_json()
    })
}

pub fn refresh_body(access: &str, refresh: &str, expires_in: i64) -> Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "expiresIn": expires_in
    })
}

pub fn gateway_at(base_url: &str) -> AuthGateway {
    AuthGateway::new(
        reqwest::Client::new(),
        base_url,
        Arc::new(CredentialStore::in_memory()),
        Arc::new(SessionSignal::in_memory()),
    )
}

pub fn gateway_for(server: &MockServer) -> AuthGateway {
    gateway_at(&server.uri())
}

/// Put a session in place as if a login had happened.
pub fn sign_in(gateway: &AuthGateway, access: &str, refresh: &str) {
    gateway
        .store()
        .write(SessionRecord::new(access, refresh, 900, account()));
    gateway.signal().set().expect("in-memory signal");
}

pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

pub async fn requests_to(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}
