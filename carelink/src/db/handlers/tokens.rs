//! Database repository for refresh and password-reset tokens.
//!
//! Refresh tokens are stored as SHA-256 fingerprints of the signed token
//! string, looked up exactly on use. Password-reset secrets are argon2-hashed
//! like passwords and verified against the hash, so neither kind of row is
//! usable if the database contents leak.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    auth::password,
    config::Config,
    crypto,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::tokens::{Token, TokenCreateDBRequest, TokenFilter, TokenKind, TokenUpdateDBRequest},
    },
    types::{TokenId, UserId, abbrev_uuid},
};

pub struct Tokens<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Tokens<'c> {
    type CreateRequest = TokenCreateDBRequest;
    type UpdateRequest = TokenUpdateDBRequest;
    type Response = Token;
    type Id = TokenId;
    type Filter = TokenFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            INSERT INTO tokens (user_id, token_hash, kind, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.token_hash)
        .bind(request.kind)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self, id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let token = sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(token)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let tokens = sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(tokens.into_iter().map(|t| (t.id, t)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut sql = String::from("SELECT * FROM tokens WHERE 1=1");
        let mut bind_idx = 0;

        if filter.user_id.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND user_id = ${bind_idx}"));
        }
        if filter.kind.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND kind = ${bind_idx}"));
        }
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ${} OFFSET ${}", bind_idx + 1, bind_idx + 2));

        let mut query = sqlx::query_as::<_, Token>(&sql);
        if let Some(user_id) = filter.user_id {
            query = query.bind(user_id);
        }
        if let Some(kind) = filter.kind {
            query = query.bind(kind);
        }
        let tokens = query.bind(filter.limit).bind(filter.skip).fetch_all(&mut *self.db).await?;

        Ok(tokens)
    }

    #[instrument(skip(self, id, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            UPDATE tokens
            SET revoked_at = COALESCE($2, revoked_at)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.revoked_at)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(token)
    }

    #[instrument(skip(self, id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Tokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Persist the fingerprint of a freshly issued refresh token
    #[instrument(skip(self, token), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_refresh_for_user(&mut self, user_id: UserId, token: &str, config: &Config) -> Result<Token> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(config.auth.native.session.refresh_token_ttl).unwrap_or(chrono::Duration::days(7));

        self.create(&TokenCreateDBRequest {
            user_id,
            token_hash: crypto::fingerprint(token),
            kind: TokenKind::Refresh,
            expires_at,
        })
        .await
    }

    /// Find the live row for a presented refresh token. Returns None for
    /// unknown, revoked, or expired tokens.
    #[instrument(skip(self, token), err)]
    pub async fn find_active_refresh(&mut self, token: &str) -> Result<Option<Token>> {
        let row = sqlx::query_as::<_, Token>(
            r#"
            SELECT * FROM tokens
            WHERE token_hash = $1 AND kind = $2 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(crypto::fingerprint(token))
        .bind(TokenKind::Refresh)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row)
    }

    /// Mark a single token as revoked
    #[instrument(skip(self), err)]
    pub async fn revoke(&mut self, id: TokenId) -> Result<Token> {
        self.update(
            id,
            &TokenUpdateDBRequest {
                revoked_at: Some(Utc::now()),
            },
        )
        .await
    }

    /// Revoke all outstanding tokens of a kind for a user. Returns the number
    /// of rows affected.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn revoke_all_for_user(&mut self, user_id: UserId, kind: TokenKind) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET revoked_at = NOW()
            WHERE user_id = $1 AND kind = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Create a password reset token for a user, returning the raw secret
    /// (for the email link) alongside the stored row.
    #[instrument(skip(self, config), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_reset_for_user(&mut self, user_id: UserId, config: &Config) -> Result<(String, Token)> {
        let raw_token = crypto::generate_token_secret();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(config.auth.native.password_reset_token_duration).unwrap_or(chrono::Duration::minutes(30));

        let params = password::Argon2Params::from(&config.auth.native.password);
        let token_hash = password::hash_string_with_params(&raw_token, Some(params)).map_err(|e| DbError::Other(anyhow::anyhow!(e)))?;

        let token = self
            .create(&TokenCreateDBRequest {
                user_id,
                token_hash,
                kind: TokenKind::PasswordReset,
                expires_at,
            })
            .await?;

        Ok((raw_token, token))
    }

    /// Find a valid reset token by ID and verify the raw secret against its hash
    #[instrument(skip(self, raw_token), err)]
    pub async fn find_valid_reset_by_id(&mut self, token_id: TokenId, raw_token: &str) -> Result<Option<Token>> {
        let token = self.get_by_id(token_id).await?;

        if let Some(token) = token {
            if token.kind != TokenKind::PasswordReset {
                return Ok(None);
            }
            // Check if token is still valid (not expired and not used)
            if token.revoked_at.is_some() {
                return Ok(None);
            }
            if Utc::now() > token.expires_at {
                return Ok(None);
            }

            // Verify the raw secret matches the hash
            match password::verify_string(raw_token, &token.token_hash) {
                Ok(true) => Ok(Some(token)),
                Ok(false) => Ok(None),
                Err(e) => {
                    tracing::error!("Token verification error for token {}: {:?}", token_id, e);
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    /// Delete rows that can never be used again. Returns the number deleted.
    #[instrument(skip(self), err)]
    pub async fn delete_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at < NOW() OR revoked_at IS NOT NULL")
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::{handlers::users::Users, models::users::UserCreateDBRequest};
    use sqlx::PgPool;
    use uuid::Uuid;

    fn test_config() -> Config {
        use base64::{Engine as _, engine::general_purpose};
        Config {
            secret_key: Some("test-signing-secret".to_string()),
            encryption_key: Some(general_purpose::STANDARD.encode([7u8; 32])),
            ..Default::default()
        }
    }

    async fn seed_user(pool: &PgPool) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        let user = users
            .create(&UserCreateDBRequest {
                first_name: "Token".to_string(),
                last_name: "Owner".to_string(),
                email: format!("{}@example.com", Uuid::new_v4().simple()),
                phone: None,
                role: Role::Doctor,
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        user.id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_refresh_token_lifecycle(pool: PgPool) {
        let user_id = seed_user(&pool).await;
        let config = test_config();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tokens::new(&mut conn);

        let jwt = "header.payload.signature";
        let created = repo.create_refresh_for_user(user_id, jwt, &config).await.unwrap();
        assert_eq!(created.kind, TokenKind::Refresh);
        // The raw token never touches the table
        assert_ne!(created.token_hash, jwt);

        let found = repo.find_active_refresh(jwt).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        // Revocation makes the same token unusable
        repo.revoke(created.id).await.unwrap();
        assert!(repo.find_active_refresh(jwt).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_revoke_all_for_user(pool: PgPool) {
        let user_id = seed_user(&pool).await;
        let config = test_config();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tokens::new(&mut conn);

        repo.create_refresh_for_user(user_id, "token.one.sig", &config).await.unwrap();
        repo.create_refresh_for_user(user_id, "token.two.sig", &config).await.unwrap();

        let revoked = repo.revoke_all_for_user(user_id, TokenKind::Refresh).await.unwrap();
        assert_eq!(revoked, 2);

        assert!(repo.find_active_refresh("token.one.sig").await.unwrap().is_none());
        assert!(repo.find_active_refresh("token.two.sig").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reset_token_verification(pool: PgPool) {
        let user_id = seed_user(&pool).await;
        let config = test_config();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tokens::new(&mut conn);

        let (raw, token) = repo.create_reset_for_user(user_id, &config).await.unwrap();
        assert_eq!(token.kind, TokenKind::PasswordReset);

        // Correct secret verifies
        let found = repo.find_valid_reset_by_id(token.id, &raw).await.unwrap();
        assert!(found.is_some());

        // Wrong secret does not
        assert!(repo.find_valid_reset_by_id(token.id, "wrong-secret").await.unwrap().is_none());

        // Used tokens are single-use
        repo.revoke(token.id).await.unwrap();
        assert!(repo.find_valid_reset_by_id(token.id, &raw).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_expired(pool: PgPool) {
        let user_id = seed_user(&pool).await;
        let config = test_config();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tokens::new(&mut conn);

        let live = repo.create_refresh_for_user(user_id, "live.token.sig", &config).await.unwrap();
        let dead = repo.create_refresh_for_user(user_id, "dead.token.sig", &config).await.unwrap();
        repo.revoke(dead.id).await.unwrap();

        let deleted = repo.delete_expired().await.unwrap();
        assert_eq!(deleted, 1);

        assert!(repo.get_by_id(live.id).await.unwrap().is_some());
        assert!(repo.get_by_id(dead.id).await.unwrap().is_none());
    }
}
