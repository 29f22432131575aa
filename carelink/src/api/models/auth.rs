//! API request/response models for authentication.

use super::users::UserResponse;
use crate::errors::Error;
use axum::{
    Json,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl RegisterRequest {
    /// Field-level validation. Password length bounds are checked in the
    /// handler against the configured policy.
    pub fn validate(&self) -> Result<(), Error> {
        let mut field_errors = HashMap::new();

        if self.first_name.trim().len() < 3 {
            field_errors.insert("first_name".to_string(), "First name should be at least 3 characters".to_string());
        }
        if self.last_name.trim().len() < 3 {
            field_errors.insert("last_name".to_string(), "Last name should be at least 3 characters".to_string());
        }
        if !self.email.contains('@') || self.email.trim().is_empty() {
            field_errors.insert("email".to_string(), "Email must be valid".to_string());
        }
        let phone_digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if phone_digits < 7 {
            field_errors.insert("phone".to_string(), "Phone number must be valid".to_string());
        }

        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                message: "Invalid registration data".to_string(),
                field_errors,
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body-based refresh for clients that do not use cookies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// The pair of Set-Cookie values issued alongside an auth response.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub access: String,
    pub refresh: String,
}

/// 200 response carrying the auth body plus both session cookies.
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookies: SessionCookies,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            AppendHeaders([(SET_COOKIE, self.cookies.access), (SET_COOKIE, self.cookies.refresh)]),
            Json(self.auth_response),
        )
            .into_response()
    }
}

/// 201 response for a freshly registered user.
pub struct RegisterResponse {
    pub auth_response: AuthResponse,
    pub cookies: SessionCookies,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::CREATED,
            AppendHeaders([(SET_COOKIE, self.cookies.access), (SET_COOKIE, self.cookies.refresh)]),
            Json(self.auth_response),
        )
            .into_response()
    }
}

/// 200 response clearing both session cookies.
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookies: SessionCookies,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            AppendHeaders([(SET_COOKIE, self.cookies.access), (SET_COOKIE, self.cookies.refresh)]),
            Json(self.auth_response),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    /// The raw token secret from the reset link
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
