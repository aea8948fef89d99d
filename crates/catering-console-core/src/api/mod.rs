//! REST API client module for the catering backend.
//!
//! This module provides the `ApiClient` pipeline used for every data call,
//! the password-management endpoints built on it, and the `ApiError`
//! taxonomy surfaced to callers.
//!
//! The API uses bearer token authentication; tokens come from the
//! credential store and are refreshed by the auth gateway.

pub mod account;
pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
