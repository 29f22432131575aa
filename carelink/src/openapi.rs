//! OpenAPI document for the management API, served at `/docs`.

use utoipa::OpenApi;

use crate::api::models::{
    auth::{
        AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, PasswordResetConfirmRequest, PasswordResetRequest,
        PasswordResetResponse, RefreshRequest, RegisterRequest,
    },
    clients::{ClientCreate, ClientResponse, ClientUpdate, Gender},
    enrollments::{
        ClientSummary, EnrollmentCreate, EnrollmentResponse, EnrollmentStatus, EnrollmentSummary, EnrollmentUpdate, ProgramSummary,
    },
    pagination::PaginatedResponse,
    programs::{ProgramCreate, ProgramResponse, ProgramUpdate},
    users::{Role, UserResponse},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Carelink API",
        description = "Client-enrollment management for health programs: clients, programs, enrollments, and session authentication."
    ),
    paths(
        crate::api::handlers::auth::signup,
        crate::api::handlers::auth::signin,
        crate::api::handlers::auth::refresh,
        crate::api::handlers::auth::logout,
        crate::api::handlers::auth::me,
        crate::api::handlers::auth::request_password_reset,
        crate::api::handlers::auth::confirm_password_reset,
        crate::api::handlers::auth::change_password,
        crate::api::handlers::clients::create_client,
        crate::api::handlers::clients::list_clients,
        crate::api::handlers::clients::search_clients,
        crate::api::handlers::clients::get_client,
        crate::api::handlers::clients::get_client_by_identification,
        crate::api::handlers::clients::update_client,
        crate::api::handlers::clients::delete_client,
        crate::api::handlers::programs::create_program,
        crate::api::handlers::programs::list_programs,
        crate::api::handlers::programs::get_program,
        crate::api::handlers::programs::update_program,
        crate::api::handlers::programs::delete_program,
        crate::api::handlers::enrollments::create_enrollment,
        crate::api::handlers::enrollments::list_enrollments,
        crate::api::handlers::enrollments::list_enrollments_by_client,
        crate::api::handlers::enrollments::list_enrollments_by_program,
        crate::api::handlers::enrollments::get_enrollment,
        crate::api::handlers::enrollments::update_enrollment,
        crate::api::handlers::enrollments::delete_enrollment,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        AuthResponse,
        AuthSuccessResponse,
        PasswordResetRequest,
        PasswordResetResponse,
        PasswordResetConfirmRequest,
        ChangePasswordRequest,
        UserResponse,
        Role,
        ClientCreate,
        ClientUpdate,
        ClientResponse,
        Gender,
        ProgramCreate,
        ProgramUpdate,
        ProgramResponse,
        EnrollmentCreate,
        EnrollmentUpdate,
        EnrollmentResponse,
        EnrollmentStatus,
        EnrollmentSummary,
        ClientSummary,
        ProgramSummary,
        PaginatedResponse<ClientResponse>,
        PaginatedResponse<ProgramResponse>,
        PaginatedResponse<EnrollmentResponse>,
    )),
    tags(
        (name = "auth", description = "Session authentication and password management"),
        (name = "clients", description = "Client records"),
        (name = "programs", description = "Health programs"),
        (name = "enrollments", description = "Client-program enrollments"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("/api/v1/client/search"));
        assert!(json.contains("/api/v1/auth/refresh"));
        assert!(json.contains("/api/v1/enrollment/client/{client_id}"));
    }
}
