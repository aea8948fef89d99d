//! Session and token lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: the single stored session (tokens, expiry, account)
//! - `SessionSignal`: an edge-visible "signed in" marker for the route guard
//! - `RouteGuard`: admission decisions based only on that marker
//! - `AuthGateway`: login, single-flight refresh and logout
//! - `SessionMonitor`: idle warning and automatic logout
//! - `AuthContext`: the façade the rest of the console uses
//!
//! Access tokens count as expired 60 seconds before their stated expiry.

pub mod context;
pub mod gateway;
pub mod guard;
pub mod monitor;
pub mod session;
pub mod signal;
pub mod single_flight;

pub use context::{AuthContext, AuthState};
pub use gateway::{AuthGateway, RefreshOutcome, SessionEvent};
pub use guard::{Admission, RouteGuard};
pub use monitor::{
    ActivityKind, MonitorConfig, MonitorPhase, MonitorSnapshot, SessionKeeper, SessionMonitor,
};
pub use session::{CredentialStore, SessionRecord, EXPIRY_MARGIN_SECS};
pub use signal::{SessionSignal, SIGNAL_TTL_DAYS};
pub use single_flight::SingleFlight;
