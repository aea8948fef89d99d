//! Route admission for protected views, decided before the app loads.
//!
//! The guard only looks at the [`SessionSignal`](super::SessionSignal). It
//! does not validate tokens; it just keeps signed-out visitors from loading
//! protected views and bounces signed-in visitors away from the login page.

use url::form_urlencoded;

/// Paths anyone may visit.
const PUBLIC_PATHS: &[&str] = &["/", "/login", "/forgot-password", "/reset-password"];

const LOGIN_PATH: &str = "/login";
const HOME_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Redirect(String),
}

#[derive(Debug, Clone, Default)]
pub struct RouteGuard;

impl RouteGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn admit(&self, path: &str, signal_present: bool) -> Admission {
        if is_static_asset(path) {
            return Admission::Allow;
        }

        if !is_public_path(path) && !signal_present {
            let redirect: String = form_urlencoded::Serializer::new(String::new())
                .append_pair("redirect", path)
                .finish();
            return Admission::Redirect(format!("{}?{}", LOGIN_PATH, redirect));
        }

        if path == LOGIN_PATH && signal_present {
            return Admission::Redirect(HOME_PATH.to_string());
        }

        Admission::Allow
    }
}

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|public| {
        path == *public
            || path
                .strip_prefix(public)
                .is_some_and(|rest| rest.starts_with('/') && *public != "/")
    })
}

// Bundles, API routes and anything that looks like a file
fn is_static_asset(path: &str) -> bool {
    path.starts_with("/_next") || path.starts_with("/api") || path.contains('.')
}
