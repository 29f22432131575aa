use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        enrollments::{EnrollmentCreate, EnrollmentResponse, EnrollmentStatus, EnrollmentUpdate, ListEnrollmentsQuery},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Clients, Enrollments, Programs, Repository, enrollments::EnrollmentFilter},
        models::enrollments::{EnrollmentCreateDBRequest, EnrollmentUpdateDBRequest},
    },
    errors::Error,
    types::{ClientId, EnrollmentId, ProgramId},
};

/// Enroll a client into a program
#[utoipa::path(
    post,
    path = "/api/v1/enrollment",
    request_body = EnrollmentCreate,
    tag = "enrollments",
    responses(
        (status = 201, description = "Enrollment created", body = EnrollmentResponse),
        (status = 404, description = "Client or program not found"),
        (status = 409, description = "Client already has an active enrollment in the program"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(request): Json<EnrollmentCreate>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Both sides of the join must exist
    let mut client_repo = Clients::new(&mut conn);
    if client_repo.get_by_id(request.client_id).await?.is_none() {
        return Err(Error::not_found("Client", request.client_id));
    }

    let mut program_repo = Programs::new(&mut conn);
    if program_repo.get_by_id(request.program_id).await?.is_none() {
        return Err(Error::not_found("Program", request.program_id));
    }

    let mut repo = Enrollments::new(&mut conn);

    // One ACTIVE enrollment per client per program; history does not block
    if repo.find_active(request.client_id, request.program_id).await?.is_some() {
        return Err(Error::Conflict {
            message: "Client is already enrolled in this program".to_string(),
        });
    }

    let created = repo
        .create(&EnrollmentCreateDBRequest {
            client_id: request.client_id,
            program_id: request.program_id,
            enrollment_date: request.enrollment_date.unwrap_or_else(|| Utc::now().date_naive()),
            status: request.status.unwrap_or(EnrollmentStatus::Active),
            notes: request.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(created))))
}

/// List enrollments with pagination and optional status filter
#[utoipa::path(
    get,
    path = "/api/v1/enrollment",
    params(ListEnrollmentsQuery),
    tag = "enrollments",
    responses(
        (status = 200, description = "Paginated enrollments", body = PaginatedResponse<EnrollmentResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListEnrollmentsQuery>,
) -> Result<Json<PaginatedResponse<EnrollmentResponse>>, Error> {
    let page = query.pagination.page();
    let page_size = query.pagination.page_size();

    let mut filter = EnrollmentFilter::new(query.pagination.offset(), page_size);
    filter.status = query.status;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Enrollments::new(&mut conn);

    let enrollments = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let responses: Vec<EnrollmentResponse> = enrollments.into_iter().map(EnrollmentResponse::from).collect();

    Ok(Json(PaginatedResponse::new(responses, total_count, page, page_size)))
}

/// All enrollments for a client
#[utoipa::path(
    get,
    path = "/api/v1/enrollment/client/{client_id}",
    tag = "enrollments",
    responses(
        (status = 200, description = "The client's enrollments", body = [EnrollmentResponse]),
        (status = 404, description = "Client not found"),
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %client_id))]
pub async fn list_enrollments_by_client(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(client_id): Path<ClientId>,
) -> Result<Json<Vec<EnrollmentResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut client_repo = Clients::new(&mut conn);
    if client_repo.get_by_id(client_id).await?.is_none() {
        return Err(Error::not_found("Client", client_id));
    }

    let mut repo = Enrollments::new(&mut conn);
    let enrollments = repo.list_by_client(client_id).await?;

    Ok(Json(enrollments.into_iter().map(EnrollmentResponse::from).collect()))
}

/// All enrollments for a program
#[utoipa::path(
    get,
    path = "/api/v1/enrollment/program/{program_id}",
    tag = "enrollments",
    responses(
        (status = 200, description = "The program's enrollments", body = [EnrollmentResponse]),
        (status = 404, description = "Program not found"),
    )
)]
#[tracing::instrument(skip_all, fields(program_id = %program_id))]
pub async fn list_enrollments_by_program(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(program_id): Path<ProgramId>,
) -> Result<Json<Vec<EnrollmentResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut program_repo = Programs::new(&mut conn);
    if program_repo.get_by_id(program_id).await?.is_none() {
        return Err(Error::not_found("Program", program_id));
    }

    let mut repo = Enrollments::new(&mut conn);
    let enrollments = repo.list_by_program(program_id).await?;

    Ok(Json(enrollments.into_iter().map(EnrollmentResponse::from).collect()))
}

/// Fetch an enrollment by ID
#[utoipa::path(
    get,
    path = "/api/v1/enrollment/{id}",
    tag = "enrollments",
    responses(
        (status = 200, description = "The enrollment", body = EnrollmentResponse),
        (status = 404, description = "Enrollment not found"),
    )
)]
#[tracing::instrument(skip_all, fields(enrollment_id = %id))]
pub async fn get_enrollment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<EnrollmentResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Enrollments::new(&mut conn);

    let enrollment = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Enrollment", id))?;

    Ok(Json(EnrollmentResponse::from(enrollment)))
}

/// Update an enrollment's status, dates, or notes
#[utoipa::path(
    put,
    path = "/api/v1/enrollment/{id}",
    request_body = EnrollmentUpdate,
    tag = "enrollments",
    responses(
        (status = 200, description = "Enrollment updated", body = EnrollmentResponse),
        (status = 404, description = "Enrollment not found"),
    )
)]
#[tracing::instrument(skip_all, fields(enrollment_id = %id))]
pub async fn update_enrollment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<EnrollmentId>,
    Json(request): Json<EnrollmentUpdate>,
) -> Result<Json<EnrollmentResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Enrollments::new(&mut conn);

    let existing = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Enrollment", id))?;

    // Leaving the program stamps today's date unless the caller supplies one;
    // re-activating clears a stale exit date
    let exit_date = match (request.status, request.exit_date) {
        (Some(EnrollmentStatus::Completed) | Some(EnrollmentStatus::Withdrawn), None) => {
            if existing.exit_date.is_none() {
                Some(Some(Utc::now().date_naive()))
            } else {
                None
            }
        }
        (Some(EnrollmentStatus::Active), None) => Some(None),
        (_, provided) => provided.map(Some),
    };

    let updated = repo
        .update(
            id,
            &EnrollmentUpdateDBRequest {
                enrollment_date: request.enrollment_date,
                exit_date,
                status: request.status,
                notes: request.notes,
            },
        )
        .await?;

    Ok(Json(EnrollmentResponse::from(updated)))
}

/// Delete an enrollment
#[utoipa::path(
    delete,
    path = "/api/v1/enrollment/{id}",
    tag = "enrollments",
    responses(
        (status = 204, description = "Enrollment deleted"),
        (status = 404, description = "Enrollment not found"),
    )
)]
#[tracing::instrument(skip_all, fields(enrollment_id = %id))]
pub async fn delete_enrollment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<EnrollmentId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Enrollments::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::not_found("Enrollment", id));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{authed_server, create_test_client, create_test_program};
    use axum::http::StatusCode;
    use chrono::NaiveDate;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_enrollment_defaults(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        let response = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: program.id,
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: EnrollmentResponse = response.json();
        assert_eq!(body.status, EnrollmentStatus::Active);
        assert_eq!(body.enrollment_date, Utc::now().date_naive());
        assert_eq!(body.client.id, client.id);
        assert_eq!(body.program.name, program.name);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_enrollment_unknown_references(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let server = authed_server(pool).await;

        let response = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: uuid::Uuid::new_v4(),
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: uuid::Uuid::new_v4(),
                program_id: uuid::Uuid::new_v4(),
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_active_enrollment_conflict(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        let payload = EnrollmentCreate {
            client_id: client.id,
            program_id: program.id,
            enrollment_date: None,
            status: None,
            notes: None,
        };

        server.post("/api/v1/enrollment").json(&payload).await.assert_status(StatusCode::CREATED);

        let response = server.post("/api/v1/enrollment").json(&payload).await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_completion_stamps_exit_date(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        let created: EnrollmentResponse = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: program.id,
                enrollment_date: Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()),
                status: None,
                notes: None,
            })
            .await
            .json();
        assert!(created.exit_date.is_none());

        // Completing without an exit date stamps today
        let response = server
            .put(&format!("/api/v1/enrollment/{}", created.id))
            .json(&EnrollmentUpdate {
                status: Some(EnrollmentStatus::Completed),
                ..Default::default()
            })
            .await;
        response.assert_status(StatusCode::OK);
        let completed: EnrollmentResponse = response.json();
        assert_eq!(completed.status, EnrollmentStatus::Completed);
        assert_eq!(completed.exit_date, Some(Utc::now().date_naive()));

        // Re-activating clears the exit date
        let response = server
            .put(&format!("/api/v1/enrollment/{}", created.id))
            .json(&EnrollmentUpdate {
                status: Some(EnrollmentStatus::Active),
                ..Default::default()
            })
            .await;
        let reactivated: EnrollmentResponse = response.json();
        assert_eq!(reactivated.status, EnrollmentStatus::Active);
        assert!(reactivated.exit_date.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_explicit_exit_date_is_kept(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        let created: EnrollmentResponse = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: program.id,
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await
            .json();

        let exit = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let response = server
            .put(&format!("/api/v1/enrollment/{}", created.id))
            .json(&EnrollmentUpdate {
                status: Some(EnrollmentStatus::Withdrawn),
                exit_date: Some(exit),
                ..Default::default()
            })
            .await;
        let withdrawn: EnrollmentResponse = response.json();
        assert_eq!(withdrawn.exit_date, Some(exit));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_by_client_and_program(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let other_program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        for program_id in [program.id, other_program.id] {
            server
                .post("/api/v1/enrollment")
                .json(&EnrollmentCreate {
                    client_id: client.id,
                    program_id,
                    enrollment_date: None,
                    status: None,
                    notes: None,
                })
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server.get(&format!("/api/v1/enrollment/client/{}", client.id)).await;
        response.assert_status(StatusCode::OK);
        let body: Vec<EnrollmentResponse> = response.json();
        assert_eq!(body.len(), 2);

        let response = server.get(&format!("/api/v1/enrollment/program/{}", program.id)).await;
        let body: Vec<EnrollmentResponse> = response.json();
        assert_eq!(body.len(), 1);

        // Unknown client 404s rather than returning an empty list
        let response = server.get(&format!("/api/v1/enrollment/client/{}", uuid::Uuid::new_v4())).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_with_status_filter(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let other_program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        let first: EnrollmentResponse = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: program.id,
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await
            .json();
        server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: other_program.id,
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await
            .assert_status(StatusCode::CREATED);

        server
            .put(&format!("/api/v1/enrollment/{}", first.id))
            .json(&EnrollmentUpdate {
                status: Some(EnrollmentStatus::Withdrawn),
                ..Default::default()
            })
            .await
            .assert_status(StatusCode::OK);

        let response = server.get("/api/v1/enrollment?status=active").await;
        let body: PaginatedResponse<EnrollmentResponse> = response.json();
        assert_eq!(body.total_count, 1);

        let response = server.get("/api/v1/enrollment?status=withdrawn").await;
        let body: PaginatedResponse<EnrollmentResponse> = response.json();
        assert_eq!(body.total_count, 1);
        assert_eq!(body.data[0].id, first.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_enrollment(pool: PgPool) {
        let client = create_test_client(&pool).await;
        let program = create_test_program(&pool).await;
        let server = authed_server(pool).await;

        let created: EnrollmentResponse = server
            .post("/api/v1/enrollment")
            .json(&EnrollmentCreate {
                client_id: client.id,
                program_id: program.id,
                enrollment_date: None,
                status: None,
                notes: None,
            })
            .await
            .json();

        let response = server.delete(&format!("/api/v1/enrollment/{}", created.id)).await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server.get(&format!("/api/v1/enrollment/{}", created.id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_requires_authentication(pool: PgPool) {
        let server = crate::test_utils::create_test_app(pool).await;

        let response = server.get("/api/v1/enrollment").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
