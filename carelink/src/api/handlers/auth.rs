use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LogoutResponse,
            PasswordResetConfirmRequest, PasswordResetRequest, PasswordResetResponse, RefreshRequest, RegisterRequest,
            RegisterResponse, SessionCookies,
        },
        users::{CurrentUser, Role, UserResponse},
    },
    auth::{
        password,
        session::{self, TokenUse},
    },
    db::{
        handlers::{Repository, Tokens, Users},
        models::{tokens::TokenKind, users::UserCreateDBRequest, users::UserUpdateDBRequest},
    },
    email::EmailService,
    errors::Error,
};

/// Register a new staff account
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = RegisterRequest,
    tag = "auth",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "User already exists"),
        (status = 422, description = "Field validation failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signup(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    // Check if native auth is enabled
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    request.validate()?;
    validate_password_length(&request.password, &state.config)?;

    let email = request.email.trim().to_lowercase();

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Check if user with this email already exists
    let mut user_repo = Users::new(&mut tx);
    if user_repo.get_user_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    // Hash the password on a blocking thread to avoid blocking the async runtime
    let password_hash = hash_password_blocking(request.password.clone(), &state.config).await?;

    let create_request = UserCreateDBRequest {
        first_name: request.first_name,
        last_name: request.last_name,
        email,
        phone: Some(request.phone),
        role: Role::Doctor,
        password_hash,
    };

    let created_user = user_repo.create(&create_request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let user_response = UserResponse::from(created_user);
    let cookies = start_session(&state, &CurrentUser::from_response(&user_response)).await?;

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user: user_response,
            message: "Registration successful".to_string(),
        },
        cookies,
    })
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signin(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut conn);

    // Uniform message for unknown email and wrong password
    let user = user_repo
        .get_user_by_email(&request.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        })?;

    // Verify password on a blocking thread to avoid blocking the async runtime
    let password = request.password.clone();
    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        });
    }

    let user_response = UserResponse::from(user);
    let cookies = start_session(&state, &CurrentUser::from_response(&user_response)).await?;

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: user_response,
            message: "Login successful".to_string(),
        },
        cookies,
    })
}

/// Rotate the refresh token and issue a fresh session
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Session refreshed", body = AuthResponse),
        (status = 401, description = "Missing or invalid refresh token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<LoginResponse, Error> {
    let cookie_name = &state.config.auth.native.session.refresh_cookie_name;
    let token = cookie_value(&headers, cookie_name)
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Missing refresh token".to_string()),
        })?;

    let payload = session::verify_token(&token, TokenUse::Refresh, &state.config)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // The token must still be live in the database; a rotated-out token is
    // treated as a replay and rejected.
    let mut token_repo = Tokens::new(&mut conn);
    let stored = token_repo
        .find_active_refresh(&token)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid refresh token".to_string()),
        })?;

    let mut user_repo = Users::new(&mut conn);
    let user = user_repo.get_by_id(payload.sub).await?.ok_or_else(|| Error::Unauthenticated {
        message: Some("Invalid refresh token".to_string()),
    })?;

    // Rotation: the presented token is spent the moment it is used
    let mut token_repo = Tokens::new(&mut conn);
    token_repo.revoke(stored.id).await?;
    drop(conn);

    let user_response = UserResponse::from(user);
    let cookies = start_session(&state, &CurrentUser::from_response(&user_response)).await?;

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: user_response,
            message: "Session refreshed".to_string(),
        },
        cookies,
    })
}

/// Logout: revoke outstanding refresh tokens and clear the session cookies
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current_user: CurrentUser) -> Result<LogoutResponse, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut token_repo = Tokens::new(&mut conn);
    token_repo.revoke_all_for_user(current_user.id, TokenKind::Refresh).await?;

    let session_config = &state.config.auth.native.session;
    let cookies = SessionCookies {
        access: clear_cookie(&session_config.access_cookie_name, &state.config),
        refresh: clear_cookie(&session_config.refresh_cookie_name, &state.config),
    };

    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookies,
    })
}

/// The current authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut conn);

    let user = user_repo.get_by_id(current_user.id).await?.ok_or(Error::Unauthenticated {
        message: Some("User not found".to_string()),
    })?;

    Ok(Json(UserResponse::from(user)))
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-resets",
    request_body = PasswordResetRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password reset email sent (when the account exists)", body = PasswordResetResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Respond identically whether or not the account exists, to avoid
    // email enumeration
    let mut user_repo = Users::new(&mut tx);
    let user = user_repo.get_user_by_email(&request.email.trim().to_lowercase()).await?;

    if let Some(user) = user {
        let mut token_repo = Tokens::new(&mut tx);
        let (raw_token, token) = token_repo.create_reset_for_user(user.id, &state.config).await?;

        let email_service = EmailService::new(&state.config)?;
        email_service
            .send_password_reset_email(&user.email, Some(&user.first_name), &token.id, &raw_token)
            .await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PasswordResetResponse {
        message: "If an account with that email exists, a password reset link has been sent.".to_string(),
    }))
}

/// Confirm a password reset with the emailed token
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-resets/{token_id}/confirm",
    request_body = PasswordResetConfirmRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password reset successful", body = PasswordResetResponse),
        (status = 400, description = "Invalid or expired token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Path(token_id): Path<Uuid>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<PasswordResetResponse>, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    validate_password_length(&request.new_password, &state.config)?;

    let new_password_hash = hash_password_blocking(request.new_password.clone(), &state.config).await?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let token = {
        let mut token_repo = Tokens::new(&mut tx);
        token_repo
            .find_valid_reset_by_id(token_id, &request.token)
            .await?
            .ok_or_else(|| Error::BadRequest {
                message: "Invalid or expired reset token".to_string(),
            })?
    };

    {
        let mut user_repo = Users::new(&mut tx);
        user_repo
            .update(
                token.user_id,
                &UserUpdateDBRequest {
                    password_hash: Some(new_password_hash),
                    ..Default::default()
                },
            )
            .await?;
    }

    {
        // Spend every outstanding reset token and force re-login everywhere
        let mut token_repo = Tokens::new(&mut tx);
        token_repo.revoke_all_for_user(token.user_id, TokenKind::PasswordReset).await?;
        token_repo.revoke_all_for_user(token.user_id, TokenKind::Refresh).await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PasswordResetResponse {
        message: "Password has been reset successfully".to_string(),
    }))
}

/// Change password for the authenticated user
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-change",
    request_body = ChangePasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password changed successfully", body = AuthSuccessResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Current password is incorrect"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut conn);

    let user = user_repo.get_by_id(current_user.id).await?.ok_or(Error::Unauthenticated {
        message: Some("User not found".to_string()),
    })?;

    // Verify current password
    let current_password = request.current_password.clone();
    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&current_password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    validate_password_length(&request.new_password, &state.config)?;

    let new_password_hash = hash_password_blocking(request.new_password.clone(), &state.config).await?;

    user_repo
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                password_hash: Some(new_password_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(AuthSuccessResponse {
        message: "Password changed successfully".to_string(),
    }))
}

impl CurrentUser {
    /// Build claims input from a response DTO without consuming it
    fn from_response(user: &UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Issue an access/refresh pair, persist the refresh fingerprint, and format
/// both Set-Cookie values.
async fn start_session(state: &AppState, user: &CurrentUser) -> Result<SessionCookies, Error> {
    let access_token = session::create_token(user, TokenUse::Access, &state.config)?;
    let refresh_token = session::create_token(user, TokenUse::Refresh, &state.config)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut token_repo = Tokens::new(&mut conn);
    token_repo.create_refresh_for_user(user.id, &refresh_token, &state.config).await?;

    let session_config = &state.config.auth.native.session;
    Ok(SessionCookies {
        access: create_session_cookie(
            &session_config.access_cookie_name,
            &access_token,
            session_config.access_token_ttl.as_secs(),
            &state.config,
        ),
        refresh: create_session_cookie(
            &session_config.refresh_cookie_name,
            &refresh_token,
            session_config.refresh_token_ttl.as_secs(),
            &state.config,
        ),
    })
}

/// Helper function to create a session cookie
fn create_session_cookie(name: &str, token: &str, max_age: u64, config: &crate::config::Config) -> String {
    let session_config = &config.auth.native.session;
    format!(
        "{}={}; Path=/; HttpOnly; Secure={}; SameSite={}; Max-Age={}",
        name, token, session_config.cookie_secure, session_config.cookie_same_site, max_age
    )
}

/// An expired cookie that clears the browser's copy
fn clear_cookie(name: &str, config: &crate::config::Config) -> String {
    let session_config = &config.auth.native.session;
    format!(
        "{}=; Path=/; HttpOnly; Secure={}; SameSite={}; Max-Age=0",
        name, session_config.cookie_secure, session_config.cookie_same_site
    )
}

/// Read a cookie value from the request headers
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_str = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_str.split(';') {
        if let Some((cookie_name, value)) = cookie.trim().split_once('=')
            && cookie_name == name
        {
            return Some(value.to_string());
        }
    }
    None
}

fn validate_password_length(password: &str, config: &crate::config::Config) -> Result<(), Error> {
    let password_config = &config.auth.native.password;
    if password.len() < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if password.len() > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }
    Ok(())
}

async fn hash_password_blocking(password: String, config: &crate::config::Config) -> Result<String, Error> {
    let params = password::Argon2Params::from(&config.auth.native.password);
    tokio::task::spawn_blocking(move || password::hash_string_with_params(&password, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}
