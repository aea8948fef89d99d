use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid credentials ({status}): {message}")]
    InvalidCredentials { status: u16, message: String },

    #[error("Unauthorized - session expired, please log in again")]
    Unauthorized,

    #[error("No refresh token available")]
    RefreshUnavailable,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error envelope returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<ErrorMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
    }

    /// Extract a human-readable message from an error response body.
    ///
    /// Prefers the backend's `message` field (joining validation arrays),
    /// then its `error` field, then the status reason with a truncated body.
    pub fn message_from_body(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
            match envelope.message {
                Some(ErrorMessage::One(message)) if !message.is_empty() => return message,
                Some(ErrorMessage::Many(messages)) if !messages.is_empty() => {
                    return messages.join(", ")
                }
                _ => {}
            }
            if let Some(error) = envelope.error {
                return error;
            }
        }

        let reason = status.canonical_reason().unwrap_or("Unknown status");
        if body.trim().is_empty() {
            reason.to_string()
        } else {
            format!("{}: {}", reason, Self::truncate_body(body))
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Http {
            status: status.as_u16(),
            message: Self::message_from_body(status, body),
        }
    }

    /// Classify a failed login response. Client errors mean the backend
    /// rejected the credentials; anything else is passed through.
    pub fn from_login_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.is_client_error() {
            ApiError::InvalidCredentials {
                status: status.as_u16(),
                message: Self::message_from_body(status, body),
            }
        } else {
            Self::from_status(status, body)
        }
    }

    /// True for errors that end the session and require a fresh login.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::RefreshUnavailable)
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::InvalidCredentials { status, .. } | ApiError::Http { status, .. } => {
                Some(*status)
            }
            ApiError::Unauthorized | ApiError::RefreshUnavailable => Some(401),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_message_from_single_message() {
        let body = r#"{"statusCode":404,"message":"Contract not found","error":"Not Found"}"#;
        assert_eq!(
            ApiError::message_from_body(StatusCode::NOT_FOUND, body),
            "Contract not found"
        );
    }

    #[test]
    fn test_message_from_validation_array() {
        let body = r#"{"statusCode":400,"message":["email must be an email","password is too short"]}"#;
        assert_eq!(
            ApiError::message_from_body(StatusCode::BAD_REQUEST, body),
            "email must be an email, password is too short"
        );
    }

    #[test]
    fn test_message_falls_back_to_reason() {
        assert_eq!(
            ApiError::message_from_body(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
        assert_eq!(
            ApiError::message_from_body(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            "Internal Server Error: boom"
        );
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));
    }

    #[test]
    fn test_login_status_classification() {
        let rejected =
            ApiError::from_login_status(StatusCode::UNAUTHORIZED, r#"{"message":"Bad password"}"#);
        assert!(matches!(
            rejected,
            ApiError::InvalidCredentials { status: 401, ref message } if message == "Bad password"
        ));

        let outage = ApiError::from_login_status(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(matches!(outage, ApiError::Http { status: 503, .. }));
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiError::Unauthorized.is_unauthorized());
        assert!(ApiError::RefreshUnavailable.is_unauthorized());
        assert!(!ApiError::MissingCredentials.is_unauthorized());
        assert_eq!(ApiError::Unauthorized.status(), Some(401));
    }
}
