//! The only component that talks to the login, refresh and logout endpoints.
//!
//! These calls go straight to the HTTP client and never through
//! [`ApiClient`](crate::api::ApiClient): the pipeline calls back into
//! `refresh` on a 401, so routing the gateway through it would recurse.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::session::{CredentialStore, SessionRecord};
use super::signal::SessionSignal;
use super::single_flight::SingleFlight;
use crate::api::ApiError;
use crate::models::auth::RefreshRequest;
use crate::models::{Account, Credentials, LoginResponse, RefreshResponse};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";

/// Buffered session events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 16;

/// Session transitions announced to the UI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { account_id: String },
    Refreshed,
    LoggedOut,
    /// The session is gone; the shell should navigate to the login view.
    LoginRequired,
}

/// How a refresh attempt ended. Shared by every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(String),
    NoRefreshToken,
    Rejected { status: u16 },
    Failed(String),
}

impl RefreshOutcome {
    pub fn access_token(self) -> Option<String> {
        match self {
            RefreshOutcome::Refreshed(token) => Some(token),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<String, ApiError> {
        match self {
            RefreshOutcome::Refreshed(token) => Ok(token),
            RefreshOutcome::NoRefreshToken => Err(ApiError::RefreshUnavailable),
            RefreshOutcome::Rejected { .. } | RefreshOutcome::Failed(_) => {
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Login, single-flight refresh and logout against the auth endpoints.
/// Clone is cheap - every clone shares the store, signal and refresh slot.
#[derive(Clone)]
pub struct AuthGateway {
    client: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    signal: Arc<SessionSignal>,
    refresh_flight: Arc<SingleFlight<RefreshOutcome>>,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthGateway {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        store: Arc<CredentialStore>,
        signal: Arc<SessionSignal>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            signal,
            refresh_flight: Arc::new(SingleFlight::new()),
            events,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn signal(&self) -> &Arc<SessionSignal> {
        &self.signal
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.refresh_flight.in_flight()
    }

    /// Exchange credentials for a session and store it.
    pub async fn login(&self, credentials: &Credentials) -> Result<Account, ApiError> {
        if !credentials.is_complete() {
            return Err(ApiError::MissingCredentials);
        }

        debug!(email = %credentials.email, "Logging in");
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Login rejected");
            return Err(ApiError::from_login_status(status, &body));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;

        let account = login.account.clone();
        self.store.write(SessionRecord::new(
            login.access_token,
            login.refresh_token,
            login.expires_in,
            login.account,
        ));
        self.mark_signal();

        info!(account_id = %account.id, company_type = %account.company_type, "Logged in");
        self.emit(SessionEvent::LoggedIn {
            account_id: account.id.clone(),
        });
        Ok(account)
    }

    /// Mint a new access token. `None` means the session is over.
    pub async fn refresh(&self) -> Option<String> {
        self.refresh_outcome().await.access_token()
    }

    /// Single-flight refresh: concurrent callers share one network call and
    /// all observe its outcome. Any outcome other than `Refreshed` ends the
    /// session and announces `LoginRequired`.
    pub async fn refresh_outcome(&self) -> RefreshOutcome {
        let gateway = self.clone();
        let flight = self.refresh_flight.get_or_start(move || {
            let refresh_token = gateway.store.refresh_token();
            async move {
                match refresh_token {
                    Some(token) => gateway.perform_refresh(token).await,
                    None => {
                        // Nothing to refresh with; whatever is left is unusable
                        warn!("No refresh token stored; ending session");
                        gateway.end_session();
                        RefreshOutcome::NoRefreshToken
                    }
                }
            }
        });
        flight.await
    }

    async fn perform_refresh(&self, refresh_token: String) -> RefreshOutcome {
        debug!("Refreshing access token");
        let result = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Token refresh request failed");
                self.end_session();
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "Token refresh rejected");
            self.end_session();
            return RefreshOutcome::Rejected {
                status: status.as_u16(),
            };
        }

        let refreshed: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Unreadable token refresh response");
                self.end_session();
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let access_token = refreshed.access_token.clone();
        if !self.store.write_refreshed(
            refreshed.access_token,
            refreshed.refresh_token,
            refreshed.expires_in,
        ) {
            return RefreshOutcome::Failed("session ended during refresh".to_string());
        }
        self.mark_signal();

        info!(expires_in = refreshed.expires_in, "Access token refreshed");
        self.emit(SessionEvent::Refreshed);
        RefreshOutcome::Refreshed(access_token)
    }

    /// Revoke on the backend if possible, then always drop the local session.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store.refresh_token() {
            let mut request = self.client.post(self.url(LOGOUT_PATH)).json(&RefreshRequest {
                refresh_token: &refresh_token,
            });
            if let Some(access_token) = self.store.access_token() {
                request = request.bearer_auth(access_token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Backend session revoked");
                }
                Ok(response) => {
                    warn!(status = response.status().as_u16(), "Backend logout failed");
                }
                Err(e) => {
                    warn!(error = %e, "Backend logout failed");
                }
            }
        }

        self.store.clear();
        self.unmark_signal();
        info!("Logged out");
        self.emit(SessionEvent::LoggedOut);
        self.emit(SessionEvent::LoginRequired);
    }

    /// Tear down after an unrecoverable refresh failure.
    fn end_session(&self) {
        self.store.clear();
        self.unmark_signal();
        self.emit(SessionEvent::LoginRequired);
    }

    // The signal lives outside the credential store, so the two writes are
    // not atomic. One retry, then the signal is left stale and logged.
    fn mark_signal(&self) {
        if let Err(e) = self.signal.set() {
            warn!(error = %e, "Failed to set session signal, retrying");
            if let Err(e) = self.signal.set() {
                error!(
                    error = %e,
                    "Session signal not set; guard will treat this session as signed out"
                );
            }
        }
    }

    fn unmark_signal(&self) {
        if let Err(e) = self.signal.clear() {
            warn!(error = %e, "Failed to clear session signal, retrying");
            if let Err(e) = self.signal.clear() {
                error!(error = %e, "Session signal left behind until its TTL lapses");
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_outcome_mapping() {
        assert_eq!(
            RefreshOutcome::Refreshed("t".to_string()).into_result().ok(),
            Some("t".to_string())
        );
        assert!(matches!(
            RefreshOutcome::NoRefreshToken.into_result(),
            Err(ApiError::RefreshUnavailable)
        ));
        assert!(matches!(
            RefreshOutcome::Rejected { status: 401 }.into_result(),
            Err(ApiError::Unauthorized)
        ));
        assert_eq!(RefreshOutcome::Failed("x".to_string()).access_token(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_token_needs_no_server() {
        // Nothing listens on this address; a network call would fail loudly
        let gateway = AuthGateway::new(
            Client::new(),
            "http://127.0.0.1:9/",
            Arc::new(CredentialStore::in_memory()),
            Arc::new(SessionSignal::in_memory()),
        );
        assert_eq!(gateway.base_url(), "http://127.0.0.1:9");
        assert_eq!(gateway.refresh_outcome().await, RefreshOutcome::NoRefreshToken);
        assert!(!gateway.refresh_in_flight());
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let gateway = AuthGateway::new(
            Client::new(),
            "http://127.0.0.1:9",
            Arc::new(CredentialStore::in_memory()),
            Arc::new(SessionSignal::in_memory()),
        );
        let result = gateway.login(&Credentials::new("ops@sabores.cl", "")).await;
        assert!(matches!(result, Err(ApiError::MissingCredentials)));
        assert!(gateway.store().read().is_none());
    }
}
