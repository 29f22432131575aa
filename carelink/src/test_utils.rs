//! Shared helpers for tests: config, app servers, and entity factories.

use axum::http::{HeaderValue, header};
use axum_test::TestServer;
use base64::{Engine as _, engine::general_purpose};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        auth::LoginRequest,
        clients::Gender,
        enrollments::EnrollmentStatus,
        users::{CurrentUser, Role},
    },
    auth::{
        password,
        session::{self, TokenUse},
    },
    build_router,
    config::{Config, EmailTransportConfig},
    db::{
        handlers::{Clients, Enrollments, Programs, Repository, Users},
        models::{
            clients::{ClientCreateDBRequest, ClientDBResponse},
            enrollments::{EnrollmentCreateDBRequest, EnrollmentDBResponse},
            programs::{ProgramCreateDBRequest, ProgramDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
};

/// The password every factory-created test user can sign in with
pub const TEST_PASSWORD: &str = "password123";

/// A config with deterministic keys, registration enabled, and cheap argon2
/// parameters so hashing doesn't dominate test time
pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-signing-secret".to_string()),
        encryption_key: Some(general_purpose::STANDARD.encode([7u8; 32])),
        ..Default::default()
    };

    config.auth.native.enabled = true;
    config.auth.native.allow_registration = true;
    config.auth.native.password.argon2_memory_kib = 8192;
    config.auth.native.password.argon2_iterations = 1;

    config.email.transport = EmailTransportConfig::File {
        path: std::env::temp_dir().join("carelink-test-emails").to_string_lossy().to_string(),
    };

    config
}

/// A test server over the full router, no default credentials
pub async fn create_test_app(pool: PgPool) -> TestServer {
    let state = AppState::builder().db(pool).config(create_test_config()).build();
    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// A test server that sends a valid access token with every request
pub async fn authed_server(pool: PgPool) -> TestServer {
    let user = create_test_user(&pool, Role::Doctor).await;
    let config = create_test_config();

    let token = session::create_token(&CurrentUser::from(user), TokenUse::Access, &config).expect("Failed to mint access token");

    let mut server = create_test_app(pool).await;
    server.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    server
}

/// A signin body for a factory-created user
pub fn signin_request(email: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
    }
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    let mut repo = Users::new(&mut conn);

    let params = password::Argon2Params {
        memory_kib: 8192,
        iterations: 1,
        parallelism: 1,
    };

    repo.create(&UserCreateDBRequest {
        first_name: "Test".to_string(),
        last_name: "Coordinator".to_string(),
        email: format!("user-{}@example.com", Uuid::new_v4().simple()),
        phone: Some(format!("+2547{}", &Uuid::new_v4().simple().to_string()[..8])),
        role,
        password_hash: password::hash_string_with_params(TEST_PASSWORD, Some(params)).unwrap(),
    })
    .await
    .expect("Failed to create test user")
}

pub async fn create_test_client(pool: &PgPool) -> ClientDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    let mut repo = Clients::new(&mut conn);

    let suffix = Uuid::new_v4().simple().to_string();
    repo.create(&ClientCreateDBRequest {
        first_name: "Asha".to_string(),
        last_name: "Mwangi".to_string(),
        identification_number: format!("ID-{suffix}"),
        email: Some(format!("client-{suffix}@example.com")),
        phone: None,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15).unwrap(),
        gender: Gender::Female,
        address: None,
    })
    .await
    .expect("Failed to create test client")
}

pub async fn create_test_program(pool: &PgPool) -> ProgramDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    let mut repo = Programs::new(&mut conn);

    repo.create(&ProgramCreateDBRequest {
        name: format!("Program {}", Uuid::new_v4().simple()),
        description: Some("Test program".to_string()),
    })
    .await
    .expect("Failed to create test program")
}

pub async fn create_test_enrollment(pool: &PgPool, client_id: crate::ClientId, program_id: crate::ProgramId) -> EnrollmentDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    let mut repo = Enrollments::new(&mut conn);

    repo.create(&EnrollmentCreateDBRequest {
        client_id,
        program_id,
        enrollment_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        status: EnrollmentStatus::Active,
        notes: None,
    })
    .await
    .expect("Failed to create test enrollment")
}
