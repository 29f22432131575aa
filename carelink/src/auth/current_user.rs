//! Request extractor for the authenticated user.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, TokenUse},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract user from the access-token session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Cookie header present but unreadable
#[instrument(skip(parts, config))]
fn try_session_cookie_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.native.session.access_cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name == cookie_name
        {
            match session::verify_token(value, TokenUse::Access, config) {
                Ok(payload) => return Some(Ok(payload.into())),
                Err(_) => {
                    // Invalid/expired token; keep scanning other cookies.
                    // Expired tokens are expected here, not an error to surface.
                    continue;
                }
            }
        }
    }
    None
}

/// Extract user from a Bearer access token if present and valid
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid access token
/// - Some(Err(error)): Bearer token present but invalid
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;

    match session::verify_token(token, TokenUse::Access, config) {
        Ok(payload) => Some(Ok(payload.into())),
        Err(e) => Some(Err(e)),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Try Bearer first (most explicit), then the session cookie.
        // Each method returns Option<Result<CurrentUser>>:
        // - None means the auth method is not applicable (no credentials present)
        // - Some(Ok(user)) means successful authentication
        // - Some(Err(error)) means credentials were present but invalid

        match try_bearer_auth(parts, &state.config) {
            Some(Ok(user)) => {
                debug!("Found bearer-authenticated user: {}", user.id);
                return Ok(user);
            }
            Some(Err(e)) => {
                trace!("Bearer authentication failed: {:?}", e);
            }
            None => {
                trace!("No bearer authentication attempted");
            }
        }

        if state.config.auth.native.enabled {
            match try_session_cookie_auth(parts, &state.config) {
                Some(Ok(user)) => {
                    debug!("Found session-cookie authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("Session cookie authentication failed: {:?}", e);
                }
                None => {
                    trace!("No session cookie authentication attempted");
                }
            }
        }

        Err(Error::Unauthenticated { message: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::create_test_config;
    use axum::extract::FromRequestParts as _;
    use uuid::Uuid;

    fn test_state() -> AppState {
        // The extractor never touches the pool, so a lazy one is fine here
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost:5432/carelink_extractor_test")
            .unwrap();
        AppState::builder().db(pool).config(create_test_config()).build()
    }

    fn test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "nurse@example.com".to_string(),
            role: Role::Doctor,
        }
    }

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(name, value)
            .body(())
            .unwrap();
        let (parts, _body) = request.into_parts();
        parts
    }

    #[tokio::test]
    async fn test_cookie_extraction() {
        let state = test_state();
        let user = test_user();

        let token = session::create_token(&user, TokenUse::Access, &state.config).unwrap();
        let cookie_name = &state.config.auth.native.session.access_cookie_name;
        let mut parts = parts_with_header("cookie", &format!("other=1; {cookie_name}={token}"));

        let extracted = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.id, user.id);
        assert_eq!(extracted.email, user.email);
    }

    #[tokio::test]
    async fn test_bearer_extraction() {
        let state = test_state();
        let user = test_user();

        let token = session::create_token(&user, TokenUse::Access, &state.config).unwrap();
        let mut parts = parts_with_header("authorization", &format!("Bearer {token}"));

        let extracted = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.id, user.id);
    }

    #[tokio::test]
    async fn test_refresh_token_not_accepted_for_access() {
        let state = test_state();
        let user = test_user();

        let token = session::create_token(&user, TokenUse::Refresh, &state.config).unwrap();
        let mut parts = parts_with_header("authorization", &format!("Bearer {token}"));

        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let state = test_state();

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        let error = result.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_cookie_rejected() {
        let state = test_state();
        let cookie_name = &state.config.auth.native.session.access_cookie_name;
        let mut parts = parts_with_header("cookie", &format!("{cookie_name}=not.a.real.token"));

        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(result.is_err());
    }
}
