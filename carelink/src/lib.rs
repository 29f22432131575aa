//! # carelink: Client-Enrollment Management for Health Programs
//!
//! `carelink` is the backend for a health-program administration dashboard. It
//! keeps the records a small clinical team works with every day: clients
//! (the people served), programs (the initiatives they can join), and
//! enrollments (the lifecycle of a client's participation in a program),
//! behind a cookie-authenticated JSON API.
//!
//! ## Overview
//!
//! The service exposes a REST API under `/api/v1` with four resource groups:
//! `auth`, `client`, `program`, and `enrollment`. Program coordinators sign in
//! with email and password; sessions are carried by a pair of HttpOnly cookies
//! (a short-lived access token and a rotating refresh token). Every resource
//! route requires an authenticated user.
//!
//! Session tokens are JWTs signed with HMAC-SHA256 whose user payload is
//! sealed with AES-256-GCM, so tokens are opaque to their holders. Refresh
//! tokens are single-use: each refresh revokes the presented token and issues
//! a new pair, and a replayed token is rejected.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for all persistence.
//!
//! The **API layer** ([`api`]) holds one handler module per resource plus the
//! request/response DTOs. The **authentication layer** ([`auth`]) provides
//! password hashing (argon2), token minting/verification, and the request
//! extractor for the current user. The **database layer** ([`db`]) uses the
//! repository pattern: each table has a repository implementing a common
//! CRUD trait plus entity-specific lookups, returning typed models rather
//! than rows.
//!
//! A background token sweeper runs alongside the HTTP server and deletes
//! expired or revoked token rows on an interval.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use carelink::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = carelink::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     carelink::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
mod crypto;
pub mod db;
mod email;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password,
    db::handlers::{Repository, Tokens, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    openapi::ApiDoc,
};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ClientId, EnrollmentId, ProgramId, TokenId, UserId};

/// Application state shared across all request handlers.
///
/// Carries the database pool and the loaded configuration; both are cheap to
/// clone per request.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the carelink database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the admin on first startup, or updates the password of
/// the existing account when one is configured. Returns `None` (and logs a
/// warning) when no admin password is configured and the user doesn't exist.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> anyhow::Result<Option<UserId>> {
    let email = email.trim().to_lowercase();

    let password_hash = match password {
        Some(pwd) => Some(password::hash_string(pwd).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo
        .get_user_by_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to check existing admin user: {e}"))?
    {
        // User exists - update password if provided
        if let Some(password_hash) = password_hash {
            user_repo
                .update(
                    existing_user.id,
                    &UserUpdateDBRequest {
                        password_hash: Some(password_hash),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| anyhow::anyhow!("Failed to update admin password: {e}"))?;
        }
        tx.commit().await?;
        return Ok(Some(existing_user.id));
    }

    let Some(password_hash) = password_hash else {
        tracing::warn!("admin_password is not set and no admin account exists; skipping initial admin creation");
        return Ok(None);
    };

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            email,
            phone: None,
            role: Role::Admin,
            password_hash,
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create admin user: {e}"))?;

    tx.commit().await?;
    Ok(Some(created_user.id))
}

/// Setup the database connection pool, run migrations, and seed the admin user
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;

    let mut options = sqlx::postgres::PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(pool_settings.acquire_timeout_secs));
    if pool_settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(std::time::Duration::from_secs(pool_settings.idle_timeout_secs));
    }
    if pool_settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(std::time::Duration::from_secs(pool_settings.max_lifetime_secs));
    }

    let pool = options.connect(&config.database.url).await?;
    migrator().run(&pool).await?;

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;
    let wildcard = cors_config.allowed_origins.iter().any(|origin| origin == "*");

    if wildcard && cors_config.allow_credentials {
        anyhow::bail!("CORS cannot combine a wildcard origin with allow_credentials");
    }

    let mut cors = if wildcard {
        CorsLayer::new().allow_origin(tower_http::cors::Any)
    } else {
        let origins = cors_config
            .allowed_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new().allow_origin(origins)
    };

    cors = cors
        .allow_credentials(cors_config.allow_credentials)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// Auth routes are public; every client/program/enrollment route requires an
/// authenticated user via the `CurrentUser` extractor.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, clients, enrollments, programs};

    let auth_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/password-resets", post(auth::request_password_reset))
        .route("/auth/password-resets/{token_id}/confirm", post(auth::confirm_password_reset))
        .route("/auth/password-change", post(auth::change_password));

    let client_routes = Router::new()
        .route("/client", post(clients::create_client).get(clients::list_clients))
        .route("/client/search", get(clients::search_clients))
        .route("/client/identification/{id_number}", get(clients::get_client_by_identification))
        .route(
            "/client/{id}",
            get(clients::get_client)
                .patch(clients::update_client)
                .delete(clients::delete_client),
        );

    let program_routes = Router::new()
        .route("/program", post(programs::create_program).get(programs::list_programs))
        .route(
            "/program/{id}",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        );

    let enrollment_routes = Router::new()
        .route(
            "/enrollment",
            post(enrollments::create_enrollment).get(enrollments::list_enrollments),
        )
        .route("/enrollment/client/{client_id}", get(enrollments::list_enrollments_by_client))
        .route("/enrollment/program/{program_id}", get(enrollments::list_enrollments_by_program))
        .route(
            "/enrollment/{id}",
            get(enrollments::get_enrollment)
                .put(enrollments::update_enrollment)
                .delete(enrollments::delete_enrollment),
        );

    let cors_layer = create_cors_layer(&state.config)?;

    let api_routes = auth_routes
        .merge(client_routes)
        .merge(program_routes)
        .merge(enrollment_routes)
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(healthz))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Liveness probe with a database ping
async fn healthz(axum::extract::State(state): axum::extract::State<AppState>) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;

    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Health check database ping failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}

/// Container for background tasks and their lifecycle management.
///
/// When dropped, the `drop_guard` cancels the shutdown token, signaling all
/// tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Setup background services (currently the token sweeper)
fn setup_background_services(pool: PgPool, config: Config, shutdown_token: tokio_util::sync::CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let sweep_interval = config.token_sweep_interval;
    let sweeper_shutdown = shutdown_token.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sweeper_shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match pool.acquire().await {
                        Ok(mut conn) => {
                            let mut repo = Tokens::new(&mut conn);
                            match repo.delete_expired().await {
                                Ok(0) => {}
                                Ok(n) => tracing::debug!("Token sweeper removed {n} dead token rows"),
                                Err(e) => tracing::warn!("Token sweep failed: {e}"),
                            }
                        }
                        Err(e) => tracing::warn!("Token sweeper could not acquire a connection: {e}"),
                    }
                }
            }
        }
    });
    background_tasks.push(handle);

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, seeds the initial admin user, and starts background tasks
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let bg_services = setup_background_services(pool.clone(), config.clone(), shutdown_token);

        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Carelink listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        // Stop background tasks and wait for them to finish
        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
