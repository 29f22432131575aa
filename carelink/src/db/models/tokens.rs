//! Database models for refresh and password-reset tokens.

use crate::auth::password::Argon2Params;
use crate::types::{TokenId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What a persisted token row is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "token_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Refresh,
    PasswordReset,
}

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct Token {
    pub id: TokenId,
    pub user_id: UserId,
    pub token_hash: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Request for creating a token row. `token_hash` is already hashed or
/// fingerprinted by the caller-facing repository methods.
#[derive(Debug, Clone)]
pub struct TokenCreateDBRequest {
    pub user_id: UserId,
    pub token_hash: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// Request for updating a token (mark as revoked)
#[derive(Debug, Clone)]
pub struct TokenUpdateDBRequest {
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Filter for listing tokens
#[derive(Debug, Clone)]
pub struct TokenFilter {
    pub user_id: Option<UserId>,
    pub kind: Option<TokenKind>,
    pub skip: i64,
    pub limit: i64,
}

/// Inputs for minting a password-reset token
#[derive(Debug, Clone)]
pub struct ResetTokenRequest {
    pub user_id: UserId,
    pub raw_token: String,
    pub expires_at: DateTime<Utc>,
    pub argon2_params: Argon2Params,
}
