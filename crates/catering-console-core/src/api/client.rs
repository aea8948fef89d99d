//! Authenticated request pipeline for the catering API.
//!
//! Every data call made by the console (contracts, service days, companies,
//! users, reports) goes through [`ApiClient::call`], which attaches the
//! current bearer token and recovers from a single 401 by asking the
//! [`AuthGateway`] for a fresh token and retrying once.

use reqwest::{header, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::AuthGateway;
use crate::models::SessionStatus;

/// Liveness ping used to extend an idle session
const SESSION_STATUS_PATH: &str = "/auth/session-status";

/// HTTP request timeout in seconds.
/// The pipeline has no timeout of its own; this is the transport's.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client shared by the gateway and the pipeline.
pub fn http_client() -> Result<reqwest::Client, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

/// API client for the catering backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    gateway: AuthGateway,
}

impl ApiClient {
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// Perform an authenticated call and parse the JSON response.
    ///
    /// A 204 or an empty body is parsed as JSON `null`, so callers expecting
    /// no content can ask for `()` or `Option<T>`.
    pub async fn call<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        // Sent even if it looks expired locally; the server decides
        let token = self.gateway.store().access_token();

        let response = self.send(&method, &url, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::parse(response, &url).await;
        }

        debug!(url = %url, "Got 401, refreshing token");
        let Some(new_token) = self.gateway.refresh().await else {
            warn!(url = %url, "Token refresh failed, session ended");
            return Err(ApiError::Unauthorized);
        };

        let retried = self.send(&method, &url, body, Some(&new_token)).await?;
        Self::parse(retried, &url).await
    }

    /// Call an endpoint that takes no credentials (password recovery).
    /// No token is attached and a 401 is not treated specially.
    pub async fn call_anonymous<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        let response = self.send(&method, &url, body, None).await?;
        Self::parse(response, &url).await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.call::<T, ()>(Method::GET, endpoint, None).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn patch<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(Method::PATCH, endpoint, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.call::<T, ()>(Method::DELETE, endpoint, None).await
    }

    /// Tell the backend the user is still active. Does not touch stored tokens.
    pub async fn touch(&self) -> Result<SessionStatus, ApiError> {
        self.get(SESSION_STATUS_PATH).await
    }

    async fn send<B>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .gateway
            .http_client()
            .request(method.clone(), url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, authenticated = token.is_some(), "Sending request");
        Ok(request.send().await?)
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        if status == StatusCode::NO_CONTENT {
            return Self::empty();
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Self::empty();
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    fn empty<T: DeserializeOwned>() -> Result<T, ApiError> {
        serde_json::from_value(serde_json::Value::Null).map_err(|_| {
            ApiError::InvalidResponse("expected a response body, got none".to_string())
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.gateway.base_url(), endpoint)
    }
}
