//! Password management endpoints.

use reqwest::Method;

use super::{ApiClient, ApiError};
use crate::models::auth::{ForgotPasswordRequest, ResetPasswordRequest};
use crate::models::{ChangePasswordRequest, MessageResponse};

const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

impl ApiClient {
    /// Change the signed-in user's password.
    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        let response: Option<MessageResponse> = self.post(CHANGE_PASSWORD_PATH, request).await?;
        Ok(response.unwrap_or_default())
    }

    /// Ask the backend to email a reset link. Works signed out.
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let body = ForgotPasswordRequest { email };
        let response: Option<MessageResponse> = self
            .call_anonymous(Method::POST, FORGOT_PASSWORD_PATH, Some(&body))
            .await?;
        Ok(response.unwrap_or_default())
    }

    /// Set a new password using the token from the reset email.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let body = ResetPasswordRequest { token, new_password };
        let response: Option<MessageResponse> = self
            .call_anonymous(Method::POST, RESET_PASSWORD_PATH, Some(&body))
            .await?;
        Ok(response.unwrap_or_default())
    }
}
