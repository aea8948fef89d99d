//! Data models shared with the backend.
//!
//! - `Account`: the authenticated company's profile
//! - Auth request/response bodies for login, refresh and the password flows

pub mod account;
pub mod auth;

pub use account::{Account, CompanyStatus, CompanyType};
pub use auth::{
    ChangePasswordRequest, Credentials, LoginResponse, MessageResponse, RefreshResponse,
    SessionStatus,
};
