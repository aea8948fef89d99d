use std::path::Path;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::gateway::{AuthGateway, SessionEvent};
use super::monitor::SessionKeeper;
use super::session::CredentialStore;
use super::signal::SessionSignal;
use crate::api::{ApiClient, ApiError};
use crate::models::{Account, Credentials};

/// Authentication state as seen by views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthState {
    pub account: Option<Account>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl AuthState {
    fn signed_out() -> Self {
        Self {
            account: None,
            is_authenticated: false,
            is_loading: false,
        }
    }

    fn from_store(store: &CredentialStore) -> Self {
        // An expired access token still counts: the pipeline refreshes it
        match store.read() {
            Some(record) => Self {
                account: Some(record.account),
                is_authenticated: true,
                is_loading: false,
            },
            None => Self::signed_out(),
        }
    }
}

/// Façade views use for auth: current state plus login/logout.
/// All protocol work is delegated to the [`AuthGateway`].
///
/// The state follows the credential store. When the gateway ends a session
/// on its own (failed refresh, idle timeout) the context picks it up from
/// the gateway's events without anyone calling back into it.
/// Clone is cheap - clones share the same state.
#[derive(Clone)]
pub struct AuthContext {
    gateway: AuthGateway,
    client: ApiClient,
    shared: Arc<Shared>,
}

struct Shared {
    state: watch::Sender<AuthState>,
    follower: Option<JoinHandle<()>>,
}

impl Shared {
    /// Bring the published state in line with the store. Subscribers are
    /// only woken when something actually changed.
    fn reconcile(&self, store: &CredentialStore) {
        let current = AuthState::from_store(store);
        self.state.send_if_modified(|state| {
            if *state == current {
                return false;
            }
            *state = current;
            true
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(ref follower) = self.follower {
            follower.abort();
        }
    }
}

impl AuthContext {
    /// Initialize from whatever the credential store already holds.
    /// The store is read synchronously, so the state is never loading.
    ///
    /// Inside a tokio runtime a background task follows the gateway's
    /// session events; outside one, the accessors still re-read the store.
    pub fn new(gateway: AuthGateway) -> Self {
        let initial = AuthState::from_store(gateway.store());
        debug!(authenticated = initial.is_authenticated, "Auth context initialized");
        let (state, _) = watch::channel(initial);

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| Shared {
            state,
            follower: Handle::try_current().ok().map(|runtime| {
                runtime.spawn(follow_events(
                    gateway.subscribe(),
                    Arc::clone(gateway.store()),
                    weak.clone(),
                ))
            }),
        });

        Self {
            client: ApiClient::new(gateway.clone()),
            gateway,
            shared,
        }
    }

    /// Wire up the HTTP client, credential store and session signal for
    /// `api_url`. With a state directory the session survives restarts;
    /// without one everything lives in memory.
    pub fn connect(api_url: &str, state_dir: Option<&Path>) -> Result<Self, ApiError> {
        let (store, signal) = match state_dir {
            Some(dir) => (CredentialStore::load(dir), SessionSignal::at(dir)),
            None => (CredentialStore::in_memory(), SessionSignal::in_memory()),
        };
        let gateway = AuthGateway::new(
            crate::api::client::http_client()?,
            api_url,
            Arc::new(store),
            Arc::new(signal),
        );
        Ok(Self::new(gateway))
    }

    pub fn state(&self) -> AuthState {
        self.sync_from_store();
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.shared.state.subscribe()
    }

    pub fn account(&self) -> Option<Account> {
        self.state().account
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Account, ApiError> {
        let account = self.gateway.login(credentials).await?;
        self.shared.state.send_replace(AuthState {
            account: Some(account.clone()),
            is_authenticated: true,
            is_loading: false,
        });
        Ok(account)
    }

    pub async fn logout(&self) {
        self.gateway.logout().await;
        self.shared.state.send_replace(AuthState::signed_out());
    }

    /// Refresh the access token now. A failed refresh has already ended
    /// the session in the gateway; the state just catches up.
    pub async fn refresh_access_token(&self) -> Result<(), ApiError> {
        let result = self.gateway.refresh_outcome().await.into_result();
        self.sync_from_store();
        result.map(|_| ())
    }

    /// Re-read the credential store.
    pub fn sync_from_store(&self) {
        self.shared.reconcile(self.gateway.store());
    }
}

async fn follow_events(
    mut events: broadcast::Receiver<SessionEvent>,
    store: Arc<CredentialStore>,
    shared: Weak<Shared>,
) {
    loop {
        match events.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.reconcile(&store);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// The idle monitor pings through the pipeline and logs out through the
/// context, so views see the timeout like any other logout.
#[async_trait]
impl SessionKeeper for AuthContext {
    async fn touch(&self) -> Result<(), ApiError> {
        let status = self.client.touch().await?;
        debug!(
            is_active = status.is_active,
            last_activity_at = ?status.last_activity_at,
            "Session extended"
        );
        Ok(())
    }

    async fn expire(&self) {
        self.logout().await;
    }
}
