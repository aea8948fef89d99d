//! Session core for the catering console.
//!
//! The console is a thin client over the catering REST API. This crate owns
//! everything about being signed in: storing the session, attaching bearer
//! tokens to requests, refreshing them exactly once under concurrent 401s,
//! keeping the route guard's session signal in step, warning before idle
//! logout, and tearing the session down when it cannot be recovered.
//!
//! Views depend on [`AuthContext`] and the [`ApiClient`] it hands out; they
//! never touch the credential store directly.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    ActivityKind, Admission, AuthContext, AuthGateway, AuthState, CredentialStore, MonitorConfig,
    MonitorPhase, MonitorSnapshot, RefreshOutcome, RouteGuard, SessionEvent, SessionMonitor,
    SessionRecord, SessionSignal,
};
pub use config::Config;
pub use models::{Account, CompanyType, Credentials};
