//! Session token creation and verification.
//!
//! Tokens are JWTs signed with HMAC-SHA256 whose claims carry a sealed payload
//! rather than plaintext user data: the `data` claim is the AES-256-GCM
//! encryption of the JSON-encoded [`TokenPayload`]. Access and refresh tokens
//! share this format and are distinguished by the `usage` field inside the
//! sealed payload, so one kind can never be replayed as the other.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::users::{CurrentUser, Role},
    config::Config,
    crypto,
    errors::Error,
    types::UserId,
};

/// What a token is good for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Signed JWT claims. The user-identifying payload lives sealed inside `data`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub data: String, // Sealed TokenPayload
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

/// The sealed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub usage: TokenUse,
}

impl From<TokenPayload> for CurrentUser {
    fn from(payload: TokenPayload) -> Self {
        Self {
            id: payload.sub,
            email: payload.email,
            role: payload.role,
        }
    }
}

/// Create a signed token for a user. The TTL depends on the token use:
/// `access_token_ttl` or `refresh_token_ttl` from the session configuration.
pub fn create_token(user: &CurrentUser, usage: TokenUse, config: &Config) -> Result<String, Error> {
    let payload = TokenPayload {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        usage,
    };

    let plaintext = serde_json::to_vec(&payload).map_err(|e| Error::Internal {
        operation: format!("serialize token payload: {e}"),
    })?;

    let key = config.payload_key()?;
    let data = crypto::seal(&key, &plaintext).map_err(|e| Error::Internal {
        operation: format!("seal token payload: {e}"),
    })?;

    let session = &config.auth.native.session;
    let ttl = match usage {
        TokenUse::Access => session.access_token_ttl,
        TokenUse::Refresh => session.refresh_token_ttl,
    };

    let now = Utc::now();
    let claims = SessionClaims {
        data,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    let secret = config.signing_secret()?;
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &encoding_key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify a token's signature and expiry, open its payload, and check that it
/// was issued for the expected use.
pub fn verify_token(token: &str, expected: TokenUse, config: &Config) -> Result<TokenPayload, Error> {
    let secret = config.signing_secret()?;
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    let key = config.payload_key()?;
    let plaintext = crypto::open(&key, &token_data.claims.data).map_err(|_| Error::Unauthenticated { message: None })?;

    let payload: TokenPayload = serde_json::from_slice(&plaintext).map_err(|_| Error::Unauthenticated { message: None })?;

    if payload.usage != expected {
        return Err(Error::Unauthenticated {
            message: Some("Invalid token".to_string()),
        });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};
    use uuid::Uuid;

    fn create_test_config() -> Config {
        Config {
            secret_key: Some("test-signing-secret".to_string()),
            encryption_key: Some(general_purpose::STANDARD.encode([7u8; 32])),
            ..Default::default()
        }
    }

    fn create_test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "coordinator@example.com".to_string(),
            role: Role::Doctor,
        }
    }

    #[test]
    fn test_create_and_verify_access_token() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenUse::Access, &config).unwrap();
        assert!(!token.is_empty());

        let payload = verify_token(&token, TokenUse::Access, &config).unwrap();
        assert_eq!(payload.sub, user.id);
        assert_eq!(payload.email, user.email);
        assert_eq!(payload.role, user.role);
        assert_eq!(payload.usage, TokenUse::Access);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenUse::Refresh, &config).unwrap();

        // Valid as a refresh token
        assert!(verify_token(&token, TokenUse::Refresh, &config).is_ok());

        // But never as an access token
        let result = verify_token(&token, TokenUse::Access, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_payload_not_readable_without_encryption_key() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenUse::Access, &config).unwrap();

        // The user's email must not appear in the (base64-decodable) claims
        let claims_b64 = token.split('.').nth(1).unwrap();
        let claims_json = general_purpose::URL_SAFE_NO_PAD.decode(claims_b64).unwrap();
        let claims_str = String::from_utf8(claims_json).unwrap();
        assert!(!claims_str.contains(&user.email));
        assert!(!claims_str.contains(&user.id.to_string()));
    }

    #[test]
    fn test_verify_token_wrong_signing_secret() {
        let mut config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenUse::Access, &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_token(&token, TokenUse::Access, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_token_wrong_encryption_key() {
        let mut config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenUse::Access, &config).unwrap();

        config.encryption_key = Some(general_purpose::STANDARD.encode([9u8; 32]));
        let result = verify_token(&token, TokenUse::Access, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let user = create_test_user();

        // Manually create an expired token by setting exp in the past
        let payload = TokenPayload {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            usage: TokenUse::Access,
        };
        let key = config.payload_key().unwrap();
        let data = crypto::seal(&key, &serde_json::to_vec(&payload).unwrap()).unwrap();

        let now = Utc::now();
        let claims = SessionClaims {
            data,
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_secret(config.secret_key.as_ref().unwrap().as_bytes());
        let token = encode(&Header::default(), &claims, &encoding_key).unwrap();

        let result = verify_token(&token, TokenUse::Access, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_malformed_token() {
        let config = create_test_config();

        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            let result = verify_token(token, TokenUse::Access, &config);
            assert!(
                matches!(result.unwrap_err(), Error::Unauthenticated { .. }),
                "Expected Unauthenticated error for token: {token}"
            );
        }
    }
}
